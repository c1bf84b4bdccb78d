//! Fuzzy course-name resolution against the catalog index.

use super::VectorStore;
use tracing::{debug, warn};

/// Default catalog distance at which a course name stops matching.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 1.8;

/// Resolves user-typed course names ("MCP", "python intro") to catalog titles.
///
/// Takes the single nearest catalog entry and accepts it only when its
/// distance is strictly below the threshold. Resolution never fails: index
/// and embedding errors are logged and reported as no match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseResolver {
    threshold: f32,
}

impl Default for CourseResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl CourseResolver {
    /// Create a resolver with a distance threshold on the index's scale.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Whether a catalog distance is close enough to count as a match.
    ///
    /// A distance equal to the threshold is rejected.
    pub fn accepts(&self, distance: f32) -> bool {
        distance < self.threshold
    }

    /// Resolve a course name to a catalog title.
    pub async fn resolve(&self, store: &VectorStore, course_name: &str) -> Option<String> {
        let matches = match store.query_catalog(course_name, 1).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Error resolving course name '{}': {}", course_name, e);
                return None;
            }
        };

        let best = matches.into_iter().next()?;
        if !self.accepts(best.distance) {
            debug!(
                "Closest course to '{}' is '{}' at distance {:.3}, above threshold {:.3}",
                course_name, best.title, best.distance, self.threshold
            );
            return None;
        }

        debug!("Resolved '{}' to '{}' ({:.3})", course_name, best.title, best.distance);
        Some(best.title)
    }
}
