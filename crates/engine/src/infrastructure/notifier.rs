//! Failed-dereference notifications.

use crate::infrastructure::ports::{DereferenceFailures, NotifierPort};

/// Reports failed dereferences as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotifierPort for TracingNotifier {
    fn notify_failed_dereferences(&self, failures: &DereferenceFailures) {
        let count = failures.count();
        if count == 0 {
            return;
        }
        tracing::warn!(
            count,
            references = %failures,
            "Failed to load references for {} entr{}",
            count,
            if count == 1 { "y" } else { "ies" }
        );
    }
}
