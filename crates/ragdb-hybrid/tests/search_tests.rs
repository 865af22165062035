mod common;

use std::sync::Arc;
use std::time::Duration;

use ragdb_core::config::FusionKind;
use ragdb_core::types::{Meta, SearchHit, SourceDocument, SourceKind};
use ragdb_core::Error;
use ragdb_hybrid::{FusionStrategy, FusionWeights, IndexManager, PipelineOptions, RagPipeline, WeightedSum};

use common::{config, encoder, handbook, languages, manager, savanna, SlowEncoder};

#[tokio::test]
async fn dynamic_typing_finds_python() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    let report = index.build_from_corpus(languages()).await.unwrap();
    assert_eq!(report.sources, 3);
    assert_eq!(report.chunks, 3);

    let hits = index.hybrid_search("What is dynamic typing?", 2, FusionWeights::default()).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.source_id, "python");
    assert!(hits[0].score > hits[1].score);
    assert!(hits[0].vector_score.is_some());
    assert!(hits[0].keyword_score.is_some());
}

#[tokio::test]
async fn reciprocal_rank_fusion_agrees_on_the_top_hit() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.search.fusion = FusionKind::Rrf;
    let index = IndexManager::new(cfg, encoder()).unwrap();
    assert_eq!(index.fusion_name(), "rrf");
    index.build_from_corpus(languages()).await.unwrap();
    let hits = index.search("What is dynamic typing?").await.unwrap();
    assert_eq!(hits[0].chunk.source_id, "python");
}

#[tokio::test]
async fn single_signal_modes() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    index.build_from_corpus(languages()).await.unwrap();

    let keyword = index.keyword_search("garbage collector", 5).await.unwrap();
    assert_eq!(keyword.len(), 1);
    assert_eq!(keyword[0].chunk.source_id, "rust");
    assert!(keyword[0].vector_score.is_none());

    let vector = index.vector_search("garbage collector", 5).await.unwrap();
    assert_eq!(vector.len(), 3);
    assert_eq!(vector[0].chunk.source_id, "rust");
    assert!(vector[0].keyword_score.is_none());
}

#[tokio::test]
async fn results_are_bounded_and_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    let mut cfg_docs = handbook();
    cfg_docs.extend(languages());
    let report = index.build_from_corpus(cfg_docs).await.unwrap();
    assert!(report.chunks > 6, "handbook sources split into several chunks");

    let hits = index.hybrid_search("keyword scores", 4, FusionWeights::default()).await.unwrap();
    assert_eq!(hits.len(), 4);
    for pair in hits.windows(2) {
        assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].chunk.id < pair[1].chunk.id));
    }
    assert_eq!(hits[0].chunk.metadata.get("topic").map(String::as_str), Some("search"));
}

#[tokio::test]
async fn invalid_queries_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    index.build_from_corpus(languages()).await.unwrap();
    let w = FusionWeights::default();
    assert!(matches!(index.hybrid_search("   ", 2, w).await, Err(Error::InvalidArgument { .. })));
    assert!(matches!(index.hybrid_search("python", 0, w).await, Err(Error::InvalidArgument { .. })));
    let zero = FusionWeights { vector: 0.0, keyword: 0.0 };
    assert!(matches!(index.hybrid_search("python", 2, zero).await, Err(Error::InvalidArgument { .. })));
}

#[tokio::test]
async fn empty_corpus_is_never_ready() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    assert!(matches!(index.hybrid_search("python", 2, FusionWeights::default()).await, Err(Error::IndexNotReady(_))));

    let report = index.build_from_corpus(Vec::new()).await.unwrap();
    assert_eq!(report.chunks, 0);
    assert!(!index.is_ready());
    assert!(matches!(index.hybrid_search("python", 2, FusionWeights::default()).await, Err(Error::IndexNotReady(_))));
    assert!(matches!(index.vector_search("python", 2).await, Err(Error::IndexNotReady(_))));
    assert!(matches!(index.keyword_search("python", 2).await, Err(Error::IndexNotReady(_))));
    assert!(matches!(index.save(&dir.path().join("empty.json")), Err(Error::IndexNotReady(_))));
    assert!(!dir.path().join("empty.json").exists());
}

#[tokio::test]
async fn duplicate_sources() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    let mut docs = languages();
    docs.push(languages().remove(0));
    let report = index.build_from_corpus(docs).await.unwrap();
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.chunks, 3);

    let mut conflicting = languages();
    conflicting.push(SourceDocument::with_id("python", "Python is slow.", Meta::new()));
    let err = index.build_from_corpus(conflicting).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(index.stats().unwrap().chunks, 3, "failed build leaves the live corpus in place");
}

#[tokio::test]
async fn content_ids_are_used_when_none_given() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    let doc = SourceDocument::new("Tantivy provides the analysis chain.", Meta::new());
    let expected = format!("{}:00000", doc.id);
    index.build_from_corpus(vec![doc]).await.unwrap();
    let hits = index.keyword_search("analysis", 1).await.unwrap();
    assert_eq!(hits[0].chunk.id, expected);
}

#[tokio::test]
async fn concurrent_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let slow = Arc::new(SlowEncoder::new(Duration::from_millis(400)));
    let index = Arc::new(IndexManager::new(config(dir.path()), slow).unwrap());

    let first = {
        let index = Arc::clone(&index);
        tokio::spawn(async move { index.build_from_corpus(languages()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = index.build_from_corpus(handbook()).await;
    assert!(matches!(second, Err(Error::BuildInProgress)));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.sources, 3);
    assert!(index.is_ready());
}

#[tokio::test]
async fn stats_describe_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let index = manager(dir.path());
    assert!(index.stats().is_none());
    index.build_from_corpus(languages()).await.unwrap();
    let stats = index.stats().unwrap();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.sources, 3);
    assert_eq!(stats.dim, common::DIM);
    assert_eq!(stats.encoder_id, "hash-v1:d256");
    assert!(stats.vocabulary > 10);
}

#[tokio::test]
async fn pipeline_returns_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(manager(dir.path()));
    index.build_from_corpus(languages()).await.unwrap();

    let pipeline = RagPipeline::new(Arc::clone(&index), PipelineOptions::default());
    let evidence = pipeline.answer_query("What is dynamic typing?", 2).await.unwrap();
    assert_eq!(evidence.passages.len(), 2);
    assert_eq!(evidence.passages[0].chunk.source_id, "python");
    assert!(evidence.context().starts_with("[1] python"));

    let strict = RagPipeline::new(Arc::clone(&index), PipelineOptions { min_score: 0.99, ..PipelineOptions::default() });
    let evidence = strict.answer_query("What is dynamic typing?", 3).await.unwrap();
    assert_eq!(evidence.passages.len(), 1);

    let keyword = pipeline.answer_query_keyword("garbage collector", 3).await.unwrap();
    assert_eq!(keyword.passages.len(), 1);
    assert!(matches!(pipeline.answer_query(" ", 2).await, Err(Error::InvalidArgument { .. })));
}

#[tokio::test]
async fn pipeline_on_unbuilt_index_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = RagPipeline::new(Arc::new(manager(dir.path())), PipelineOptions::default());
    assert!(matches!(pipeline.answer_query("anything", 2).await, Err(Error::IndexNotReady(_))));
}

#[test]
fn raising_a_score_never_lowers_the_rank() {
    let vector: Vec<SearchHit> = [("a", 0.9), ("b", 0.7), ("c", 0.5), ("d", 0.2)]
        .iter()
        .map(|(id, s)| SearchHit { id: (*id).into(), score: *s, source: SourceKind::Vector })
        .collect();
    let rank_of = |kw: f32| {
        let keyword: Vec<SearchHit> = [("a", 4.0), ("b", 2.0), ("d", kw)]
            .iter()
            .map(|(id, s)| SearchHit { id: (*id).into(), score: *s, source: SourceKind::Keyword })
            .collect();
        let fused = WeightedSum.fuse(&vector, &keyword, FusionWeights::default());
        fused.iter().position(|h| h.id == "d").unwrap()
    };
    let mut prev = usize::MAX;
    for kw in [0.0, 0.5, 1.0, 2.0, 3.0, 4.0, 6.0, 10.0, 100.0] {
        let rank = rank_of(kw);
        assert!(rank <= prev, "rank {rank} after {prev} at keyword score {kw}");
        prev = rank;
    }
    assert_eq!(prev, 0);
}

const VECTOR_WEIGHTS: [f32; 7] = [0.0, 0.25, 0.5, 0.75, 1.0, 2.0, 4.0];

#[test]
fn raising_the_vector_weight_never_lowers_a_vector_hit() {
    let vector: Vec<SearchHit> = [("alpha", 1.0), ("beta", 0.8), ("delta", 0.0)]
        .iter()
        .map(|(id, s)| SearchHit { id: (*id).into(), score: *s, source: SourceKind::Vector })
        .collect();
    let keyword: Vec<SearchHit> = [("alpha", 1.7), ("gamma", 1.7)]
        .iter()
        .map(|(id, s)| SearchHit { id: (*id).into(), score: *s, source: SourceKind::Keyword })
        .collect();

    let mut prev = usize::MAX;
    let mut order = Vec::new();
    for w in VECTOR_WEIGHTS {
        let fused = WeightedSum.fuse(&vector, &keyword, FusionWeights { vector: w, keyword: 0.5 });
        let pos = |id: &str| fused.iter().position(|h| h.id == id).unwrap();
        let rank = pos("beta");
        assert!(rank <= prev, "beta fell to {rank} from {prev} at vector weight {w}");
        prev = rank;
        order.push(pos("beta") < pos("gamma"));
    }
    assert_eq!(order.first(), Some(&false));
    assert_eq!(order.last(), Some(&true));
    assert!(order.windows(2).all(|p| p[0] <= p[1]), "beta never drops back behind gamma: {order:?}");
}

#[tokio::test]
async fn hybrid_rank_of_a_vector_hit_grows_with_its_weight() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.search.candidate_multiplier = 1;
    let (fixed, docs) = savanna();
    let index = IndexManager::new(cfg, Arc::new(fixed)).unwrap();
    index.build_from_corpus(docs).await.unwrap();

    let top_vector = index.vector_search("zebra", 1).await.unwrap();
    assert_eq!(top_vector[0].chunk.source_id, "alpha");
    assert!(index.keyword_search("zebra", 4).await.unwrap().iter().all(|h| h.chunk.source_id != "beta"));

    let mut prev = usize::MAX;
    let mut beta_ahead = Vec::new();
    for w in VECTOR_WEIGHTS {
        let hits = index.hybrid_search("zebra", 3, FusionWeights { vector: w, keyword: 0.5 }).await.unwrap();
        let pos = |id: &str| hits.iter().position(|h| h.chunk.source_id == id).unwrap_or(usize::MAX);

        let gamma = &hits[pos("gamma")];
        assert!(gamma.vector_score.is_none(), "gamma comes from the keyword list only");
        assert!(gamma.keyword_score.is_some());

        let rank = pos("beta");
        assert!(rank <= prev, "beta fell to {rank} from {prev} at vector weight {w}");
        prev = rank;
        beta_ahead.push(pos("beta") < pos("gamma"));
    }
    assert_eq!(beta_ahead, [false, false, false, true, true, true, true]);
}
