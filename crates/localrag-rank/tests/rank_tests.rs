use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use localrag_core::config::RetrievalSettings;
use localrag_core::data_processor::{ChunkingConfig, DataProcessor};
use localrag_core::options::{AppliedDiversification, AppliedOptions, RedundancyPenalties, RetrievalOptions};
use localrag_core::types::{Chunk, Document, Retrieved};
use localrag_rank::{apply_domain_weights, diversify, filter_domains, rank, rank_pool};
use localrag_text::LexicalFactory;
use localrag_vector::CorpusIndex;

fn scenario_index() -> CorpusIndex {
    let docs = vec![
        Document::new("signaling", "Signaling Basics", "rail/signaling.txt", "Railway signal lights tell the train driver whether the track block ahead is clear.").with_domain("rail"),
        Document::new("engine", "Engine Diagnostics", "auto/engine.txt", "Engine diagnostics read fault codes from the car computer and check the warning light.").with_domain("auto"),
        Document::new("fares", "Fare Collection", "transit/fares.txt", "Fare collection covers tickets, passes and the gates at each station.").with_domain("transit"),
    ];
    let processor = DataProcessor::with_config(ChunkingConfig { min_chunk_chars: 0, ..ChunkingConfig::default() });
    CorpusIndex::build(&docs, &processor, &LexicalFactory).expect("build")
}

fn resolve(options: RetrievalOptions) -> AppliedOptions {
    options.resolve(&RetrievalSettings::default()).expect("resolve")
}

fn candidate(id: &str, doc: &str, title: &str, domain: Option<&str>, raw: f32) -> Retrieved {
    let chunk = Chunk {
        id: id.to_string(),
        doc_id: doc.to_string(),
        title: title.to_string(),
        source: format!("{doc}.txt"),
        offset: 0,
        text: format!("text of {id}"),
        domain: domain.map(str::to_string),
    };
    Retrieved::new(Arc::new(chunk), raw)
}

fn ids(ranked: &[Retrieved]) -> Vec<&str> {
    ranked.iter().map(|r| r.chunk.id.as_str()).collect()
}

#[test]
fn train_signal_light_finds_signaling_basics() {
    let index = scenario_index();
    let query = index.vectorize_query("train signal light").unwrap();
    let ranked = rank(&index, &query, &resolve(RetrievalOptions::default().with_k(1)));
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk.title, "Signaling Basics");
}

#[test]
fn auto_filter_returns_only_engine_diagnostics() {
    let index = scenario_index();
    let query = index.vectorize_query("train signal light").unwrap();
    let ranked = rank(&index, &query, &resolve(RetrievalOptions::default().with_k(3).with_domains(["auto"])));
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk.title, "Engine Diagnostics");
}

#[test]
fn domain_filter_is_case_insensitive_and_excludes_untagged() {
    let pool = vec![
        candidate("a", "a", "A", Some("Rail"), 0.9),
        candidate("b", "b", "B", None, 0.8),
        candidate("c", "c", "C", Some("auto"), 0.7),
    ];
    let kept = filter_domains(pool.clone(), &["RAIL".to_string()]);
    assert_eq!(ids(&kept), vec!["a"]);
    assert_eq!(filter_domains(pool, &[]).len(), 3, "empty allow-set keeps all");
}

#[test]
fn weight_crossover_flips_ranking() {
    let weights: BTreeMap<String, f32> = [("rail".to_string(), 2.0)].into();

    // 0.3 × 2.0 = 0.6 > 0.5
    let pool = vec![candidate("auto", "x", "X", Some("auto"), 0.5), candidate("rail", "y", "Y", Some("rail"), 0.3)];
    let weighted = apply_domain_weights(pool, &weights);
    assert_eq!(ids(&weighted), vec!["rail", "auto"]);
    assert!((weighted[0].weighted_score - 0.6).abs() < 1e-6);
    assert!((weighted[0].raw_score - 0.3).abs() < 1e-6, "raw score retained");
    assert_eq!(weighted[1].weighted_score, 0.5, "absent domain weighs 1.0");

    // 0.25 × 2.0 == 0.5 exactly: a tie keeps pool order
    let pool = vec![candidate("auto", "x", "X", Some("auto"), 0.5), candidate("rail", "y", "Y", Some("rail"), 0.25)];
    let weighted = apply_domain_weights(pool, &weights);
    assert_eq!(weighted[1].weighted_score, 0.5);
    assert_eq!(ids(&weighted), vec!["auto", "rail"]);

    // just past the crossover
    let pool = vec![candidate("auto", "x", "X", Some("auto"), 0.5), candidate("rail", "y", "Y", Some("rail"), 0.2501)];
    assert_eq!(ids(&apply_domain_weights(pool, &weights)), vec!["rail", "auto"]);
}

#[test]
fn weights_apply_through_rank_pool() {
    let pool = vec![candidate("auto", "x", "X", Some("auto"), 0.5), candidate("rail", "y", "Y", Some("Rail"), 0.3)];
    let applied = resolve(RetrievalOptions::default().with_k(1).with_domain_weight("RAIL", 2.0));
    assert_eq!(ids(&rank_pool(pool, &applied)), vec!["rail"]);
}

#[test]
fn mmr_penalizes_same_document() {
    let div = AppliedDiversification { lambda: 0.7, penalties: RedundancyPenalties::default() };
    let pool = vec![
        candidate("a#0000", "a", "A", None, 0.9),
        candidate("a#0001", "a", "A", None, 0.85),
        candidate("c#0000", "c", "C", None, 0.7),
    ];
    // step 2: a#0001 → 0.595 − 0.15 = 0.445, c#0000 → 0.49
    assert_eq!(ids(&diversify(pool.clone(), 3, &div)), vec!["a#0000", "c#0000", "a#0001"]);
    // λ = 1 ignores redundancy
    let pure = AppliedDiversification { lambda: 1.0, ..div };
    assert_eq!(ids(&diversify(pool, 3, &pure)), vec!["a#0000", "a#0001", "c#0000"]);
}

#[test]
fn mmr_penalizes_same_title_less_than_same_document() {
    let div = AppliedDiversification { lambda: 0.5, penalties: RedundancyPenalties::default() };
    let pool = vec![
        candidate("a#0000", "a", "Manual", None, 0.8),
        candidate("a#0001", "a", "Manual", None, 0.6),
        candidate("b#0000", "b", "Manual", None, 0.6),
    ];
    // same doc: 0.3 − 0.25 = 0.05, same title only: 0.3 − 0.15 = 0.15
    assert_eq!(ids(&diversify(pool, 2, &div)), vec!["a#0000", "b#0000"]);
}

#[test]
fn mmr_ties_go_to_first_in_pool() {
    let div = AppliedDiversification { lambda: 0.7, penalties: RedundancyPenalties::default() };
    let pool = vec![candidate("x", "x", "X", None, 0.4), candidate("y", "y", "Y", None, 0.4)];
    assert_eq!(ids(&diversify(pool, 1, &div)), vec!["x"]);
}

#[test]
fn empty_pool_ranks_to_empty() {
    let applied = resolve(RetrievalOptions::default().with_k(3).with_diversification(None, None));
    assert!(rank_pool(Vec::new(), &applied).is_empty());
    assert!(rank_pool(Vec::new(), &AppliedOptions::top_k(3)).is_empty());
}

#[test]
fn diversified_results_are_unique_and_sized() {
    let mut rng = StdRng::seed_from_u64(99);
    for round in 0..30 {
        let n = rng.gen_range(0..25);
        let pool: Vec<Retrieved> = (0..n)
            .map(|i| {
                let doc = format!("d{}", rng.gen_range(0..5));
                let domain = ["rail", "auto", "transit"][rng.gen_range(0..3)];
                candidate(&format!("{doc}#{i:04}"), &doc, &doc, Some(domain), rng.gen_range(0.0..1.0))
            })
            .collect();
        let k = rng.gen_range(1..10);
        let applied = resolve(
            RetrievalOptions::default().with_k(k).with_domains(["rail"]).with_diversification(Some(0.6), Some(40)),
        );
        let rail = pool.iter().filter(|r| r.chunk.domain.as_deref() == Some("rail")).count();
        let ranked = rank_pool(pool, &applied);

        assert_eq!(ranked.len(), k.min(rail), "round {round}");
        let unique: HashSet<&str> = ranked.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(unique.len(), ranked.len(), "no duplicate ids");
        assert!(ranked.iter().all(|r| r.chunk.domain_key() == "rail"));
    }
}
