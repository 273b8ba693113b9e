use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::fetch::{ApiSettings, RetryPolicy, RetryingFetcher, Transport};
use crate::record::{PatientRecord, PatientsPage};

/// A page that could not be fetched within its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page: u32,
    pub error: String,
}

/// Everything gathered by one traversal of the collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Traversal {
    pub records: Vec<PatientRecord>,
    pub pages_fetched: u32,
    pub failures: Vec<PageFailure>,
    /// `false` when the first page failed or traversal was abandoned mid-way.
    pub complete: bool,
}

/// Walks `/api/patients` page by page, strictly in order.
pub struct Paginator<T> {
    fetcher: RetryingFetcher<T>,
    settings: ApiSettings,
    first_page: RetryPolicy,
    next_page: RetryPolicy,
}

impl<T: Transport> Paginator<T> {
    pub fn new(transport: T, settings: ApiSettings) -> Self {
        Self {
            fetcher: RetryingFetcher::new(transport, settings.timeout),
            settings,
            first_page: RetryPolicy::first_page(),
            next_page: RetryPolicy::next_page(),
        }
    }

    /// Override the retry budgets for the first and subsequent pages.
    pub fn with_policies(mut self, first_page: RetryPolicy, next_page: RetryPolicy) -> Self {
        self.first_page = first_page;
        self.next_page = next_page;
        self
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub fn fetcher(&self) -> &RetryingFetcher<T> {
        &self.fetcher
    }

    /// Fetch every page and concatenate their records in page order.
    ///
    /// A first-page failure yields no records. A later page is re-requested with a fresh
    /// retry budget until it has failed `max_page_failures` times, after which traversal
    /// stops with what was gathered so far.
    #[instrument(name = "fetch_patients", skip(self), fields(base_url = %self.settings.base_url))]
    pub async fn fetch_all(&self, limit: u32) -> Traversal {
        self.fetch_from(limit, 1).await
    }

    async fn fetch_from(&self, limit: u32, first_page: u32) -> Traversal {
        let mut traversal = Traversal::default();

        let url = self.settings.page_url(limit, first_page);
        let first = self
            .fetcher
            .fetch_json::<PatientsPage>(&url, self.first_page)
            .await;
        let mut current = match first {
            Ok(page) => {
                info!(page = first_page, records = page.data.len(), "page fetched");
                traversal.records.extend(page.data);
                page.pagination
            }
            Err(err) => {
                error!(error = %err, "first page failed; no records fetched");
                traversal.failures.push(PageFailure {
                    page: first_page,
                    error: err.to_string(),
                });
                return traversal;
            }
        };
        traversal.pages_fetched = 1;
        let mut page_number = first_page;
        let mut failures_on_page = 0u32;

        while current.has_next {
            let Some(next) = page_number.checked_add(1) else {
                error!(page = page_number, "page number overflow; stopping traversal");
                traversal.failures.push(PageFailure {
                    page: page_number,
                    error: "server reports a next page past the last page number".into(),
                });
                return traversal;
            };
            let url = self.settings.page_url(limit, next);
            let fetched = self
                .fetcher
                .fetch_json::<PatientsPage>(&url, self.next_page)
                .await;
            match fetched {
                Ok(page) => {
                    info!(page = next, records = page.data.len(), "page fetched");
                    traversal.records.extend(page.data);
                    traversal.pages_fetched += 1;
                    current = page.pagination;
                    page_number = next;
                    failures_on_page = 0;
                }
                Err(err) => {
                    failures_on_page += 1;
                    warn!(
                        page = next,
                        failures = failures_on_page,
                        max = self.settings.max_page_failures,
                        error = %err,
                        "page fetch exhausted retries"
                    );
                    traversal.failures.push(PageFailure {
                        page: next,
                        error: err.to_string(),
                    });
                    if failures_on_page >= self.settings.max_page_failures {
                        error!(page = next, "abandoning traversal; returning partial records");
                        return traversal;
                    }
                }
            }
        }

        traversal.complete = true;
        traversal
    }
}
