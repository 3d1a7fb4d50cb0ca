//! Interactive query session.
//!
//! Pairs a [`QueryBuilder`] with the [`PageView`] of the last accepted
//! response. Every issued request carries a monotonic sequence number, and a
//! response is only applied if no newer request was issued after it, so a
//! slow older response can never overwrite a newer page.

use crate::builder::QueryBuilder;
use crate::collaborator::Collaborator;
use crate::error::{BuildError, ReportResult};
use crate::page::{PageView, ResultPage};
use crate::request::QueryRequest;

/// A built request tagged with its issue order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub seq: u64,
    pub request: QueryRequest,
}

#[derive(Debug, Default)]
pub struct Session {
    builder: QueryBuilder,
    view: Option<PageView>,
    issued: u64,
}

impl Session {
    pub fn new(builder: QueryBuilder) -> Self {
        Self {
            builder,
            view: None,
            issued: 0,
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.builder
    }

    /// The last accepted page, if any response has been applied.
    pub fn view(&self) -> Option<&PageView> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut PageView> {
        self.view.as_mut()
    }

    /// Sequence number of the most recently issued request.
    pub fn latest(&self) -> u64 {
        self.issued
    }

    /// Whether a response to `seq` would still be applied.
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.issued
    }

    /// Build the current request and tag it with the next sequence number.
    /// A failed build issues nothing.
    pub fn issue(&mut self) -> Result<Ticket, BuildError> {
        let request = self.builder.build()?;
        self.issued += 1;
        tracing::debug!(seq = self.issued, page = request.page, "issued request");
        Ok(Ticket {
            seq: self.issued,
            request,
        })
    }

    /// Issue a request for page `n`, clamped to the pages of the last
    /// accepted response when there is one. On a failed build the builder
    /// keeps its previous page.
    pub fn issue_page(&mut self, n: u32) -> Result<Ticket, BuildError> {
        let page = match &self.view {
            Some(view) => view.go_to_page(n),
            None => n.max(1),
        };
        let previous = self.builder.page();
        self.builder.set_page(page);
        self.issue().inspect_err(|_| {
            self.builder.set_page(previous);
        })
    }

    /// Apply the response to ticket `seq`. Returns `false` and leaves the
    /// view untouched when a newer request has been issued since.
    pub fn accept(&mut self, seq: u64, page: ResultPage) -> bool {
        if !self.is_current(seq) {
            tracing::info!(seq, latest = self.issued, "discarding stale response");
            return false;
        }

        match &mut self.view {
            Some(view) => view.replace(page),
            None => self.view = Some(PageView::new(page)),
        }
        true
    }

    /// Issue the current request, run it and apply the response.
    pub async fn run(&mut self, collaborator: &dyn Collaborator) -> ReportResult<&PageView> {
        let ticket = self.issue()?;
        let page = collaborator.query(&ticket.request).await?;
        self.accept(ticket.seq, page);
        Ok(self.view.get_or_insert_with(|| PageView::new(ResultPage::empty(1))))
    }
}
