use trackdex_client::{CatalogClient, RawTrack};

use crate::error::PipelineError;

/// Results requested per search page.
pub const PAGE_SIZE: usize = 50;

/// Items one query/market block accumulates before stopping.
pub const BLOCK_CAP: usize = 300;

/// The search endpoint refuses offsets at or beyond this.
const MAX_OFFSET: usize = 1000;

/// Page through one query in one market, accumulating raw items.
///
/// Stops at `cap` accumulated items, at an empty or short page, past the
/// reported result total, or at the endpoint's offset ceiling. No
/// filtering happens here; the run driver decides which items to keep.
pub fn search_block(
    client: &CatalogClient,
    query: &str,
    market: &str,
    cap: usize,
    page_size: usize,
) -> Result<Vec<RawTrack>, PipelineError> {
    let mut block = Vec::new();
    let mut offset = 0;

    while offset < MAX_OFFSET && block.len() < cap {
        let page = client.search(query, market, page_size, offset)?;
        if page.items.is_empty() {
            break;
        }
        let fetched = page.items.len();
        block.extend(page.items);

        offset += fetched;
        // A short page means the result set is exhausted.
        if fetched < page_size || offset >= page.total as usize {
            break;
        }
    }

    log::debug!("block \"{query}\" [{market}]: {} items", block.len());
    Ok(block)
}
