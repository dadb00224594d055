//! Removal of migrated documents through the REST API.
//!
//! Submitted documents (docstatus 1) must be cancelled before ERPNext will
//! delete them, and dependents must go before the documents they link to,
//! so doctypes are processed strictly in the order given.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::client::ErpNextClient;
use crate::engine::RecordError;
use crate::http::Transport;

/// Dependents first: transactions, then the masters they reference.
pub const DEFAULT_RESET_ORDER: &[&str] = &[
    "Delivery Note",
    "Sales Invoice",
    "Sales Order",
    "Customer",
    "Item",
];

/// Documents every site needs; never deleted.
const PROTECTED: &[(&str, &str)] = &[("Customer", "Guest")];

const SUBMITTED: i64 = 1;

/// Outcome for one doctype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctypeResetResult {
    pub doctype: String,
    /// Documents found.
    pub total: usize,
    pub cancelled: usize,
    pub deleted: usize,
    pub errors: Vec<RecordError>,
}

/// Ordered doctype removal.
#[derive(Debug, Clone)]
pub struct ResetPlan {
    pub doctypes: Vec<String>,
    /// List only; nothing is cancelled or deleted.
    pub dry_run: bool,
    /// Listing page size; 0 fetches each doctype in one request.
    pub page_size: usize,
}

impl ResetPlan {
    pub fn new(doctypes: Vec<String>) -> Self {
        Self {
            doctypes,
            dry_run: false,
            page_size: 500,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the plan. A doctype whose listing fails is reported with a
    /// single error and the plan moves on to the next one.
    pub async fn execute<T: Transport>(&self, client: &ErpNextClient<T>) -> Vec<DoctypeResetResult> {
        let mut results = Vec::with_capacity(self.doctypes.len());
        for doctype in &self.doctypes {
            let span = info_span!("reset", doctype = %doctype, dry_run = self.dry_run);
            results.push(self.reset_doctype(client, doctype).instrument(span).await);
        }
        results
    }

    async fn reset_doctype<T: Transport>(
        &self,
        client: &ErpNextClient<T>,
        doctype: &str,
    ) -> DoctypeResetResult {
        let mut result = DoctypeResetResult {
            doctype: doctype.to_string(),
            ..Default::default()
        };

        let documents = match client.list_all(doctype, &["name", "docstatus"], self.page_size).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Could not list {}: {}", doctype, e);
                result.errors.push(RecordError {
                    key: doctype.to_string(),
                    error: e.classify(),
                });
                return result;
            }
        };

        let targets: Vec<(String, i64)> = documents
            .iter()
            .filter_map(|doc| {
                let name = doc.get("name").and_then(Value::as_str)?;
                let docstatus = doc.get("docstatus").and_then(Value::as_i64).unwrap_or(0);
                Some((name.to_string(), docstatus))
            })
            .filter(|(name, _)| !PROTECTED.contains(&(doctype, name.as_str())))
            .collect();
        result.total = targets.len();

        if self.dry_run {
            info!("[dry-run] Would remove {} {} documents", result.total, doctype);
            return result;
        }
        info!("Removing {} {} documents", result.total, doctype);

        for (name, docstatus) in targets {
            if docstatus == SUBMITTED {
                match client.cancel(doctype, &name).await {
                    Ok(()) => {
                        debug!("Cancelled {} {}", doctype, name);
                        result.cancelled += 1;
                    }
                    Err(e) => {
                        result.errors.push(RecordError {
                            key: name,
                            error: format!("Cancel failed: {}", e.classify()),
                        });
                        continue;
                    }
                }
            }

            match client.delete(doctype, &name).await {
                Ok(()) => result.deleted += 1,
                Err(e) => result.errors.push(RecordError {
                    key: name,
                    error: e.classify(),
                }),
            }
        }

        info!(
            "{}: {} deleted, {} cancelled, {} errors",
            doctype,
            result.deleted,
            result.cancelled,
            result.errors.len()
        );
        result
    }
}
