//! End-to-end single-record scenarios: index lookup, matching, and
//! status determination together.

use copystat::config::Config;
use copystat::generic::GenericTitleDetector;
use copystat::index::CandidateIndex;
use copystat::matcher::MatchingEngine;
use copystat::matches::MatchType;
use copystat::pool::{process_record, WorkerContext};
use copystat::publication::{CountryClassification, Publication};
use copystat::status::StatusRule;

fn reference(title: &str, author: &str, year: i32, lccn: Option<&str>) -> Publication {
    let mut p = Publication::new(title);
    p.set_author(author);
    p.set_year(year);
    if let Some(l) = lccn {
        p.set_lccn(l);
    }
    p.set_source_id(&format!("REF-{title}"));
    p
}

fn context(
    registration: CandidateIndex,
    renewal: CandidateIndex,
) -> WorkerContext {
    WorkerContext {
        config: Config {
            copyright_expiration_year: Some(1929),
            max_data_year: Some(1991),
            ..Default::default()
        },
        registration,
        renewal,
        detector: GenericTitleDetector::default(),
        max_data_year: Some(1991),
        result_dir: std::env::temp_dir(),
    }
}

fn classify(ctx: &WorkerContext, publication: &mut Publication) {
    let engine = MatchingEngine::new(ctx.config.clone());
    process_record(&engine, ctx, publication).unwrap();
}

#[test]
fn pre_expiration_us_work() {
    let ctx = context(CandidateIndex::new(), CandidateIndex::new());

    let mut p = Publication::new("The Great Gatsby");
    p.set_author("Fitzgerald");
    p.set_year(1925);
    p.set_country("nyu", CountryClassification::Us);

    classify(&ctx, &mut p);

    assert_eq!(p.copyright_status, "US_PRE_1929");
    assert_eq!(p.status_rule, Some(StatusRule::UsPreCopyrightExpiration));
}

#[test]
fn registered_not_renewed_in_renewal_period() {
    let mut registration = CandidateIndex::new();
    registration.add(reference("Test Book", "Smith", 1950, None));
    let ctx = context(registration, CandidateIndex::new());

    let mut p = Publication::new("Test Book");
    p.set_author("Smith");
    p.set_year(1950);
    p.set_country("nyu", CountryClassification::Us);

    classify(&ctx, &mut p);

    assert!(p.has_registration_match());
    assert!(!p.has_renewal_match());
    assert_eq!(p.copyright_status, "US_REGISTERED_NOT_RENEWED");
    assert_eq!(p.status_rule, Some(StatusRule::UsRenewalPeriodNotRenewed));
}

#[test]
fn renewed_in_renewal_period() {
    let mut renewal = CandidateIndex::new();
    renewal.add(reference("Test Book", "Smith", 1950, None));
    let ctx = context(CandidateIndex::new(), renewal);

    let mut p = Publication::new("Test Book");
    p.set_author("Smith");
    p.set_year(1950);
    p.set_country("nyu", CountryClassification::Us);

    classify(&ctx, &mut p);

    assert!(p.has_renewal_match());
    assert_eq!(p.copyright_status, "US_RENEWED");
    assert_eq!(p.status_rule, Some(StatusRule::UsRenewalPeriodRenewed));
}

#[test]
fn foreign_identifier_match() {
    let mut registration = CandidateIndex::new();
    registration.add(reference(
        "Entirely Different Title",
        "Someone Else",
        1980,
        Some("25012345"),
    ));
    let ctx = context(registration, CandidateIndex::new());

    let mut p = Publication::new("Minimal");
    p.set_year(1950);
    p.set_country("gbr", CountryClassification::NonUs);
    p.set_lccn("25-12345");

    classify(&ctx, &mut p);

    let m = p.registration_match().expect("identifier match expected");
    assert_eq!(m.match_type, MatchType::Lccn);
    assert_eq!(p.copyright_status, "FOREIGN_REGISTERED_NOT_RENEWED_gbr");
    assert_eq!(p.status_rule, Some(StatusRule::ForeignRegisteredNotRenewed));
}

#[test]
fn out_of_data_range() {
    let mut registration = CandidateIndex::new();
    registration.add(reference("Anything", "Anyone", 1995, None));
    let ctx = context(registration, CandidateIndex::new());

    let mut p = Publication::new("Anything");
    p.set_year(1995);
    p.set_country("nyu", CountryClassification::Us);

    classify(&ctx, &mut p);

    assert_eq!(p.copyright_status, "OUT_OF_DATA_RANGE_1991");
    assert_eq!(p.status_rule, Some(StatusRule::OutOfDataRange));
}

#[test]
fn generic_title_blocks_weak_candidate() {
    let mut registration = CandidateIndex::new();
    registration.add(reference("Report", "US Army", 1960, None));
    let ctx = context(registration, CandidateIndex::new());

    let mut p = Publication::new("Report");
    p.set_author("US Navy");
    p.set_year(1960);
    p.set_country("nyu", CountryClassification::Us);

    classify(&ctx, &mut p);

    assert!(p.generic_title_detected);
    assert!(p.generic_detection_reason.starts_with("pattern:"));
    assert!(!p.has_registration_match());
    assert_eq!(p.copyright_status, "US_NO_MATCH");
    assert_eq!(p.status_rule, Some(StatusRule::UsRenewalPeriodNoMatch));
    assert!(p
        .data_completeness
        .contains(&"generic_title".to_string()));
}

#[test]
fn identifier_dominance_is_independent_of_scores() {
    // Same reference entry reachable by identifier and by similarity;
    // the identifier path must win and be marked as such.
    let mut registration = CandidateIndex::new();
    registration.add(reference("Test Book", "Smith", 1950, Some("n78-890351")));
    let ctx = context(registration, CandidateIndex::new());

    let mut p = Publication::new("Test Book");
    p.set_author("Smith");
    p.set_year(1950);
    p.set_country("nyu", CountryClassification::Us);
    p.set_lccn("N78890351");

    classify(&ctx, &mut p);

    let m = p.registration_match().unwrap();
    assert_eq!(m.match_type, MatchType::Lccn);
    assert_eq!(p.sort_score, 1000.0);
}
