//! Knowledge-base coverage estimation.
//!
//! Fail-open: if the KB store errors or times out, coverage degrades to
//! `None` and the router steers toward research. An unreachable KB must
//! never take down the request path.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use rivet_shared::{CoverageConfig, Intent, KbCoverage, RankedDoc, VendorTag};

use crate::agents::{DocFilters, KbStore};

/// Coverage level plus the documents that produced it, so Routes A and B
/// can cite them without a second KB query.
#[derive(Debug, Clone)]
pub struct CoverageEstimate {
    /// The derived coverage bucket.
    pub coverage: KbCoverage,
    /// Documents at or above the similarity floor, ranked.
    pub docs: Vec<RankedDoc>,
}

/// Derives a [`KbCoverage`] bucket from KB search results.
pub struct CoverageEvaluator {
    kb: Arc<dyn KbStore>,
    config: CoverageConfig,
}

impl CoverageEvaluator {
    /// Build an evaluator over the external KB store.
    pub fn new(kb: Arc<dyn KbStore>, config: CoverageConfig) -> Self {
        Self { kb, config }
    }

    /// Estimate coverage for a query and its intent.
    pub async fn estimate(&self, query: &str, intent: &Intent) -> CoverageEstimate {
        let filters = DocFilters {
            vendor: intent.vendor,
            equipment: intent.equipment,
            fault_codes: intent.fault_codes.clone(),
            query: query.to_string(),
            limit: self.config.search_limit,
        };
        self.estimate_filtered(&filters).await
    }

    /// Coverage for a vendor alone — the router's tie-break probe.
    pub async fn estimate_for_vendor(&self, vendor: VendorTag) -> KbCoverage {
        let filters = DocFilters {
            vendor: Some(vendor),
            query: vendor.to_string(),
            limit: self.config.search_limit,
            ..DocFilters::default()
        };
        self.estimate_filtered(&filters).await.coverage
    }

    async fn estimate_filtered(&self, filters: &DocFilters) -> CoverageEstimate {
        let timeout = Duration::from_secs(self.config.kb_timeout_secs);

        let docs = match tokio::time::timeout(timeout, self.kb.search_docs(filters)).await {
            Ok(Ok(docs)) => docs,
            Ok(Err(e)) => {
                warn!(error = %e, "kb store unreachable, failing open to NONE coverage");
                return CoverageEstimate {
                    coverage: KbCoverage::None,
                    docs: Vec::new(),
                };
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.kb_timeout_secs,
                    "kb store timed out, failing open to NONE coverage"
                );
                return CoverageEstimate {
                    coverage: KbCoverage::None,
                    docs: Vec::new(),
                };
            }
        };

        let above_floor: Vec<RankedDoc> = docs
            .into_iter()
            .filter(|d| d.similarity >= self.config.similarity_floor)
            .collect();

        CoverageEstimate {
            coverage: KbCoverage::from_match_count(above_floor.len()),
            docs: above_floor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rivet_shared::{Result, RivetError};

    /// KB stub returning `count` docs at the given similarity.
    struct StubKb {
        count: usize,
        similarity: f32,
    }

    #[async_trait]
    impl KbStore for StubKb {
        async fn search_docs(&self, _filters: &DocFilters) -> Result<Vec<RankedDoc>> {
            Ok((0..self.count)
                .map(|i| RankedDoc {
                    id: format!("doc-{i}"),
                    title: format!("Document {i}"),
                    snippet: None,
                    source_url: Some(format!("https://kb.example.com/doc-{i}")),
                    similarity: self.similarity,
                })
                .collect())
        }
    }

    struct DownKb;

    #[async_trait]
    impl KbStore for DownKb {
        async fn search_docs(&self, _filters: &DocFilters) -> Result<Vec<RankedDoc>> {
            Err(RivetError::CoverageUnavailable("connection refused".into()))
        }
    }

    struct HangingKb;

    #[async_trait]
    impl KbStore for HangingKb {
        async fn search_docs(&self, _filters: &DocFilters) -> Result<Vec<RankedDoc>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn intent() -> Intent {
        Intent {
            vendor: Some(VendorTag::Siemens),
            equipment: None,
            fault_codes: vec!["F0003".into()],
            confidence: 0.9,
        }
    }

    fn evaluator(kb: Arc<dyn KbStore>) -> CoverageEvaluator {
        CoverageEvaluator::new(
            kb,
            CoverageConfig {
                kb_timeout_secs: 1,
                ..CoverageConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn match_counts_map_to_buckets() {
        for (count, expected) in [
            (0, KbCoverage::None),
            (2, KbCoverage::None),
            (5, KbCoverage::Thin),
            (12, KbCoverage::Strong),
        ] {
            let eval = evaluator(Arc::new(StubKb {
                count,
                similarity: 0.8,
            }));
            let estimate = eval.estimate("g120c f0003", &intent()).await;
            assert_eq!(estimate.coverage, expected, "count {count}");
            assert_eq!(estimate.docs.len(), count);
        }
    }

    #[tokio::test]
    async fn below_floor_docs_do_not_count() {
        let eval = evaluator(Arc::new(StubKb {
            count: 10,
            similarity: 0.1,
        }));
        let estimate = eval.estimate("g120c f0003", &intent()).await;
        assert_eq!(estimate.coverage, KbCoverage::None);
        assert!(estimate.docs.is_empty());
    }

    #[tokio::test]
    async fn unreachable_kb_fails_open_to_none() {
        let eval = evaluator(Arc::new(DownKb));
        let estimate = eval.estimate("g120c f0003", &intent()).await;
        assert_eq!(estimate.coverage, KbCoverage::None);
    }

    #[tokio::test]
    async fn hanging_kb_times_out_to_none() {
        let eval = evaluator(Arc::new(HangingKb));
        let estimate = eval.estimate("g120c f0003", &intent()).await;
        assert_eq!(estimate.coverage, KbCoverage::None);
    }

    #[tokio::test]
    async fn vendor_probe_returns_bucket() {
        let eval = evaluator(Arc::new(StubKb {
            count: 9,
            similarity: 0.9,
        }));
        assert_eq!(
            eval.estimate_for_vendor(VendorTag::Siemens).await,
            KbCoverage::Strong
        );
    }
}
