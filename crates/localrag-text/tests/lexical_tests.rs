use localrag_core::traits::Vectorizer;
use localrag_core::types::Vector;
use localrag_text::LexicalVectorizer;

fn corpus() -> Vec<&'static str> {
    vec![
        "Railway signal lights tell the train driver when the track is clear.",
        "Engine diagnostics read fault codes from the car computer.",
        "Fare collection covers tickets, passes and the train fare gates.",
    ]
}

fn sparse(v: Vector) -> std::collections::BTreeMap<String, f32> {
    match v {
        Vector::Sparse(terms) => terms,
        Vector::Dense(_) => panic!("lexical vectors are sparse"),
    }
}

#[test]
fn idf_follows_smoothed_formula() {
    let vectorizer = LexicalVectorizer::fit(corpus());
    assert_eq!(vectorizer.corpus_size(), 3);
    // "train" appears in 2 of 3 chunks, "signal" in 1
    let expected_train = ((4.0f64 / 3.0).ln() + 1.0) as f32;
    let expected_signal = ((4.0f64 / 2.0).ln() + 1.0) as f32;
    assert!((vectorizer.idf("train").unwrap() - expected_train).abs() < 1e-6);
    assert!((vectorizer.idf("signal").unwrap() - expected_signal).abs() < 1e-6);
    // "the" is in every chunk: ln(4/4) + 1 = 1
    assert!((vectorizer.idf("the").unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn vectors_are_unit_length() {
    let vectorizer = LexicalVectorizer::fit(corpus());
    for text in corpus() {
        let v = vectorizer.vectorize(text).unwrap();
        assert!((v.l2_norm() - 1.0).abs() < 1e-5, "norm={}", v.l2_norm());
    }
}

#[test]
fn unknown_terms_weigh_zero() {
    let vectorizer = LexicalVectorizer::fit(corpus());
    let terms = sparse(vectorizer.vectorize("train zeppelin").unwrap());
    assert_eq!(terms.len(), 1);
    assert!(terms.contains_key("train"));

    let empty = vectorizer.vectorize("zeppelin blimp").unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.l2_norm(), 0.0);
}

#[test]
fn term_frequency_scales_weight_before_normalization() {
    let vectorizer = LexicalVectorizer::fit(corpus());
    let terms = sparse(vectorizer.vectorize("signal signal train").unwrap());
    let signal = 2.0 * vectorizer.idf("signal").unwrap();
    let train = vectorizer.idf("train").unwrap();
    let ratio = terms["signal"] / terms["train"];
    assert!((ratio - signal / train).abs() < 1e-5);
}

#[test]
fn fitting_is_deterministic() {
    let a = LexicalVectorizer::fit(corpus());
    let b = LexicalVectorizer::fit(corpus());
    assert_eq!(a, b);
    assert_eq!(a.vectorize(corpus()[1]).unwrap(), b.vectorize(corpus()[1]).unwrap());
}
