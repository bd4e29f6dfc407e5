//! Property tests for similarity, classification, chunking and ranking.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use rag_engine::chunking::OVERLAP_CHARS_KEY;
use rag_engine::{
    Chunk, Chunker, ChunkingConfig, ContentAwareChunker, Document, VectorRecord, classify,
    cosine_similarity, estimate_tokens, rank_by_similarity,
};

fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-10.0f32..10.0f32, dim)
}

fn arb_nonzero_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    arb_vector(dim)
        .prop_filter("non-zero vector", |v| v.iter().map(|x| x * x).sum::<f32>() > 1e-4)
}

/// Prose made of short sentences with words from a small vocabulary.
fn arb_prose() -> impl Strategy<Value = String> {
    let word = prop::sample::select(vec![
        "index", "vector", "query", "shard", "cache", "token", "batch", "store", "chunk", "log",
    ]);
    let sentence = proptest::collection::vec(word, 3..12).prop_map(|words| {
        let mut sentence = words.join(" ");
        sentence.push('.');
        sentence
    });
    proptest::collection::vec(sentence, 1..60).prop_map(|sentences| sentences.join(" "))
}

/// Prose whose sentences vary from a few words to a few hundred, none long
/// enough to exceed the default maximum on its own.
fn arb_uneven_prose() -> impl Strategy<Value = String> {
    let word = prop::sample::select(vec!["index", "vector", "query", "shard", "cache", "log"]);
    let sentence = proptest::collection::vec(word, 1..250).prop_map(|words| {
        let mut sentence = words.join(" ");
        sentence.push('.');
        sentence
    });
    proptest::collection::vec(sentence, 1..30).prop_map(|sentences| sentences.join(" "))
}

fn document(content: String) -> Document {
    Document { id: 0, content, metadata: HashMap::new() }
}

fn record(id: usize, embedding: Vec<f32>) -> Arc<VectorRecord> {
    let chunk = Chunk {
        id: Chunk::compose_id(id, 0),
        document_id: id,
        index: 0,
        content: format!("record {id}"),
        token_count: 2,
        metadata: HashMap::new(),
    };
    Arc::new(VectorRecord { id, chunk, embedding })
}

/// **Cosine similarity is symmetric and bounded**
mod prop_cosine {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn symmetric_and_within_bounds(a in arb_vector(8), b in arb_vector(8)) {
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-5);
            prop_assert!((-1.0..=1.0).contains(&ab));
        }

        #[test]
        fn self_similarity_is_one(v in arb_nonzero_vector(8)) {
            prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
        }

        #[test]
        fn mismatched_dimensions_score_zero(a in arb_vector(4), b in arb_vector(5)) {
            prop_assert_eq!(cosine_similarity(&a, &b), 0.0);
        }
    }
}

/// **Classification is a pure function of text and hint**
mod prop_classify {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn same_input_same_label(text in "\\PC{0,200}", hint in prop::option::of("[a-z]{0,10}")) {
            let first = classify(&text, hint.as_deref());
            let second = classify(&text, hint.as_deref());
            prop_assert_eq!(first, second);
        }
    }
}

/// **Every emitted chunk respects the token bounds**
mod prop_chunk_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_fit_max_and_reach_min(text in arb_prose(), max in 40usize..120) {
            let min = max / 4;
            let config =
                ChunkingConfig { max_chunk_size: max, min_chunk_size: min, overlap_size: 8 };
            let chunks = ContentAwareChunker::new(config).chunk(&document(text));
            for chunk in &chunks {
                prop_assert!(chunk.token_count <= max, "{} > {}", chunk.token_count, max);
                prop_assert!(chunk.token_count >= min, "{} < {}", chunk.token_count, min);
                prop_assert_eq!(chunk.token_count, estimate_tokens(&chunk.content));
            }
        }

        #[test]
        fn default_config_chunks_fit_max_and_reach_min(text in arb_uneven_prose()) {
            let config = ChunkingConfig::default();
            let (max, min) = (config.max_chunk_size, config.min_chunk_size);
            let chunks = ContentAwareChunker::new(config).chunk(&document(text));
            for chunk in &chunks {
                prop_assert!(chunk.token_count <= max, "{} > {}", chunk.token_count, max);
                prop_assert!(chunk.token_count >= min, "{} < {}", chunk.token_count, min);
            }
        }
    }
}

/// **Dropping each chunk's overlap prefix reconstructs the prose**
mod prop_chunk_reconstruction {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_minus_overlap_cover_the_text(text in arb_prose()) {
            let config =
                ChunkingConfig { max_chunk_size: 40, min_chunk_size: 1, overlap_size: 6 };
            let chunks = ContentAwareChunker::new(config).chunk(&document(text.clone()));

            let mut rebuilt: Vec<String> = Vec::new();
            for chunk in &chunks {
                let skip: usize = chunk
                    .metadata
                    .get(OVERLAP_CHARS_KEY)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let fresh: String = chunk.content.chars().skip(skip).collect();
                rebuilt.extend(fresh.split_whitespace().map(str::to_string));
            }
            let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            prop_assert_eq!(rebuilt, original);
        }
    }
}

/// **No result below the threshold, results sorted descending**
mod prop_threshold {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn ranked_results_meet_threshold(
            embeddings in proptest::collection::vec(arb_vector(6), 0..30),
            query in arb_nonzero_vector(6),
            threshold in -1.0f32..1.0f32,
        ) {
            let records: Vec<_> =
                embeddings.into_iter().enumerate().map(|(i, e)| record(i, e)).collect();
            let ranked = rank_by_similarity(&records, &query, threshold);
            prop_assert!(ranked.iter().all(|r| r.similarity >= threshold));
            prop_assert!(ranked.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        }
    }
}
