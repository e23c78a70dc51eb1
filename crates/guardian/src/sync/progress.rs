//! Progress events for member discovery and snapshot acquisition.

/// Progress events emitted while building a snapshot.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to list members of the configured organizations.
    ListingMembers {
        /// Number of organizations to list.
        organizations: usize,
    },

    /// Listed one organization.
    OrganizationListed {
        organization: String,
        /// Members found in this organization.
        members: usize,
    },

    /// Listing an organization failed; it is skipped.
    OrganizationFailed {
        organization: String,
        error: String,
    },

    /// Member discovery finished.
    MembersDiscovered {
        /// Unique members across all organizations.
        total: usize,
    },

    /// Starting the member fan-out.
    FetchingSnapshots {
        /// Members to fetch.
        members: usize,
        /// Worker pool size.
        workers: usize,
    },

    /// A member's snapshot was fully retrieved.
    MemberFetched {
        member: String,
        repositories: usize,
        branches: usize,
        /// Members finished so far, successful or not.
        completed: usize,
        total: usize,
    },

    /// A member could not be fully retrieved and is left out.
    MemberFailed {
        member: String,
        completed: usize,
        total: usize,
    },

    /// The fan-out finished.
    FetchComplete {
        succeeded: usize,
        failed: usize,
    },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::FetchComplete {
                succeeded: 3,
                failed: 1,
            },
        );
        emit(
            Some(&callback),
            SyncProgress::MembersDiscovered { total: 4 },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        emit(None, SyncProgress::MembersDiscovered { total: 0 });
    }
}
