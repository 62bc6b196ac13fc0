use std::num::NonZeroU32;

use tracing::debug;

use crate::contract::{Checkpoint, Item};
use crate::error::ReplayError;

/// One scan page: records in table-native order plus the position of the
/// next page. A page without `next_checkpoint` is the final page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<Item>,
    pub next_checkpoint: Option<Checkpoint>,
}

impl Page {
    pub fn is_terminal(&self) -> bool {
        self.next_checkpoint.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPageRequest<'a> {
    pub table_name: &'a str,
    pub limit: NonZeroU32,
    pub exclusive_start: Option<&'a Checkpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("start key rejected: {0}")]
    InvalidStartKey(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Paginated scan primitive of the backing table. One call is one read.
pub trait ScanBackend {
    fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError>;
}

impl<B: ScanBackend + ?Sized> ScanBackend for &B {
    fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError> {
        (**self).scan_page(request)
    }
}

enum Cursor {
    At(Option<Checkpoint>),
    Finished,
}

/// Lazy sequence of pages starting at a checkpoint (or the table start).
///
/// Holds at most the position of the next page and stops after the
/// terminal page or the first failure.
pub struct PageSource<'a, B> {
    backend: B,
    table_name: &'a str,
    limit: NonZeroU32,
    cursor: Cursor,
    pages_read: usize,
}

impl<'a, B: ScanBackend> PageSource<'a, B> {
    pub fn open(
        backend: B,
        table_name: &'a str,
        limit: NonZeroU32,
        start: Option<Checkpoint>,
    ) -> Self {
        Self {
            backend,
            table_name,
            limit,
            cursor: Cursor::At(start),
            pages_read: 0,
        }
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Drops the current position; the next read starts at the table beginning.
    pub fn rewind(&mut self) {
        self.cursor = Cursor::At(None);
        self.pages_read = 0;
    }

    fn read_page(&mut self, start: Option<Checkpoint>) -> Result<Page, ReplayError> {
        let page_index = self.pages_read;
        let request = ScanPageRequest {
            table_name: self.table_name,
            limit: self.limit,
            exclusive_start: start.as_ref(),
        };

        let page = self
            .backend
            .scan_page(&request)
            .map_err(|error| match (error, &start) {
                // Later start keys are the backend's own continuations.
                (ScanError::InvalidStartKey(reason), Some(_)) if page_index == 0 => {
                    ReplayError::invalid_checkpoint(reason)
                }
                (error, _) => ReplayError::SourceUnavailable {
                    page_index,
                    message: error.to_string(),
                },
            })?;

        if start.is_some() && page.next_checkpoint == start {
            return Err(ReplayError::SourceUnavailable {
                page_index,
                message: "scan did not advance past its start key".to_string(),
            });
        }

        self.pages_read += 1;
        debug!(
            table_name = self.table_name,
            page_index,
            records = page.records.len(),
            terminal = page.is_terminal(),
            "read scan page"
        );
        Ok(page)
    }
}

impl<B: ScanBackend> Iterator for PageSource<'_, B> {
    type Item = Result<Page, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Cursor::At(start) = std::mem::replace(&mut self.cursor, Cursor::Finished) else {
            return None;
        };

        let result = self.read_page(start);
        if let Ok(page) = &result {
            if let Some(next) = &page.next_checkpoint {
                self.cursor = Cursor::At(Some(next.clone()));
            }
        }
        Some(result)
    }
}

impl<B: ScanBackend> std::iter::FusedIterator for PageSource<'_, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_items, InMemoryTable};

    fn limit(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).expect("non-zero limit")
    }

    #[test]
    fn yields_pages_in_scan_order_until_terminal() {
        let table = InMemoryTable::new(sample_items(250));
        let pages: Vec<Page> = PageSource::open(&table, "orders", limit(100), None)
            .collect::<Result<_, _>>()
            .expect("scan should succeed");

        let sizes: Vec<usize> = pages.iter().map(|page| page.records.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(pages[2].is_terminal());
        assert_eq!(table.reads(), 3);
    }

    #[test]
    fn resumes_strictly_after_checkpoint() {
        let table = InMemoryTable::new(sample_items(30));
        let mut first = PageSource::open(&table, "orders", limit(10), None);
        let page_one = first
            .next()
            .expect("first page")
            .expect("first page succeeds");
        let checkpoint = page_one.next_checkpoint.expect("more pages remain");

        let resumed = PageSource::open(&table, "orders", limit(10), Some(checkpoint))
            .next()
            .expect("resumed page")
            .expect("resumed page succeeds");
        assert_eq!(resumed.records, sample_items(30)[10..20].to_vec());
    }

    #[test]
    fn rejected_start_key_is_invalid_checkpoint() {
        let table = InMemoryTable::new(sample_items(5));
        let stale = InMemoryTable::checkpoint_for("unknown-key");
        let mut pages = PageSource::open(&table, "orders", limit(2), Some(stale));

        let error = pages
            .next()
            .expect("one result")
            .expect_err("stale key should fail");
        assert_eq!(error.kind().as_str(), "InvalidCheckpoint");
        assert!(pages.next().is_none());
    }

    #[test]
    fn read_failure_is_source_unavailable_and_fuses() {
        let table = InMemoryTable::new(sample_items(50)).failing_on_read(1);
        let mut pages = PageSource::open(&table, "orders", limit(10), None);

        assert!(pages.next().expect("first").is_ok());
        let error = pages
            .next()
            .expect("second")
            .expect_err("second read fails");
        assert_eq!(
            error,
            ReplayError::SourceUnavailable {
                page_index: 1,
                message: "injected read failure".to_string(),
            }
        );
        assert!(pages.next().is_none());
        assert_eq!(pages.pages_read(), 1);
    }

    #[test]
    fn rejected_continuation_is_source_unavailable() {
        struct ForgetfulBackend;

        impl ScanBackend for ForgetfulBackend {
            fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError> {
                match request.exclusive_start {
                    Some(_) => Err(ScanError::InvalidStartKey(
                        "continuation expired".to_string(),
                    )),
                    None => Ok(Page {
                        records: sample_items(2),
                        next_checkpoint: Some(InMemoryTable::checkpoint_for("item-00001")),
                    }),
                }
            }
        }

        let mut pages = PageSource::open(ForgetfulBackend, "orders", limit(2), None);
        assert!(pages.next().expect("first").is_ok());

        let error = pages
            .next()
            .expect("second")
            .expect_err("continuation is refused");
        assert_eq!(
            error,
            ReplayError::SourceUnavailable {
                page_index: 1,
                message: "start key rejected: continuation expired".to_string(),
            }
        );
    }

    #[test]
    fn rewind_restarts_at_table_beginning() {
        let table = InMemoryTable::new(sample_items(5));
        let stale = InMemoryTable::checkpoint_for("unknown-key");
        let mut pages = PageSource::open(&table, "orders", limit(10), Some(stale));
        assert!(pages.next().expect("one result").is_err());

        pages.rewind();
        let page = pages
            .next()
            .expect("rewound page")
            .expect("rewound read succeeds");
        assert_eq!(page.records, sample_items(5));
        assert_eq!(pages.pages_read(), 1);
    }

    #[test]
    fn non_advancing_backend_is_rejected() {
        struct StuckBackend;

        impl ScanBackend for StuckBackend {
            fn scan_page(&self, request: &ScanPageRequest<'_>) -> Result<Page, ScanError> {
                Ok(Page {
                    records: Vec::new(),
                    next_checkpoint: request.exclusive_start.cloned(),
                })
            }
        }

        let start = InMemoryTable::checkpoint_for("item-00001");
        let error = PageSource::open(StuckBackend, "orders", limit(10), Some(start))
            .next()
            .expect("one result")
            .expect_err("stuck scan should fail");
        assert!(error.to_string().contains("did not advance"));
    }
}
