use std::{sync::Arc, time::Duration};

use biohack_service::{
	BiohackService, CacheKey, CacheState, Error, RelevancePolling, SummaryPolling, SummaryResponse,
};
use biohack_testkit::{RecordBuilder, ScriptedModel, ScriptedReply, StaticRetrieval};

fn outcome_index(prompt: &str) -> Option<usize> {
	prompt.split("Outcome: Outcome ").nth(1)?.lines().next()?.trim().parse().ok()
}

async fn settle_summary(service: &Arc<BiohackService>, question: &str) -> SummaryResponse {
	for _ in 0..200 {
		let response = service.poll_summary(question);

		if response.summary_polling != SummaryPolling::On {
			return response;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	panic!("Summary never settled.");
}

#[tokio::test]
async fn rejected_records_are_dropped_from_the_taxonomy() {
	let records = biohack_testkit::records(10);
	let model = ScriptedModel::new(|call| match call.schema_name.as_str() {
		"pertinence" => {
			let pertinent = outcome_index(&call.prompt).is_some_and(|index| index >= 4);

			ScriptedReply::ok(biohack_testkit::verdict(pertinent))
		},
		_ => ScriptedReply::ok(biohack_testkit::items(&["<b>Magnesium</b> helped."])),
	});
	let retrieval = StaticRetrieval::new(biohack_testkit::hits(&records));
	let service = biohack_testkit::service(model.clone(), retrieval).expect("Service must build.");
	let response = service.search("insomnia").await.expect("Search must succeed.");

	assert_eq!(response.relevance_polling, RelevancePolling::Finished);
	assert_eq!(response.count_experiences, 6);
	assert_eq!(response.count_reddits, 6);
	assert_eq!(response.count_studies, 0);
	assert_eq!(model.call_count("pertinence"), 10);

	let categories = response.categories.expect("Finished search must carry categories.");
	let grouped: usize = categories.iter().map(|category| category.count_experiences).sum();

	assert_eq!(grouped, 6);
	assert_eq!(categories.len(), 1);
	assert_eq!(categories[0].biohacks[0].topic.as_deref(), Some("Magnesium"));
}

#[tokio::test]
async fn low_quality_and_duplicate_records_never_reach_the_model() {
	let hits = vec![
		RecordBuilder::new("/r/a").hit(),
		RecordBuilder::new("/r/a-repost").hit(),
		RecordBuilder::new("/r/b").outcome("Vivid dreams").category(Some("other")).hit(),
		RecordBuilder::new("/r/c").outcome("Less anxiety").scores(Some(5), None).hit(),
		RecordBuilder::new("/r/d").outcome("Woke rested").category(None).hit(),
		RecordBuilder::new("10.1000/sleep.42").outcome("Longer deep sleep").hit(),
	];
	let model = ScriptedModel::agreeable();
	let service = biohack_testkit::service(model.clone(), StaticRetrieval::new(hits))
		.expect("Service must build.");
	let response = service.search("sleep").await.expect("Search must succeed.");
	let permalinks: Vec<String> = response
		.categories
		.expect("Finished search must carry categories.")
		.iter()
		.flat_map(|category| category.biohacks.iter())
		.flat_map(|biohack| biohack.experiences.iter())
		.map(|experience| experience.permalink.clone())
		.collect();

	assert_eq!(permalinks, vec!["/r/a".to_string(), "10.1000/sleep.42".to_string()]);
	assert_eq!(response.count_experiences, 2);
	assert_eq!(response.count_studies, 1);
	assert_eq!(model.call_count("pertinence"), 2);
}

#[tokio::test]
async fn concurrent_first_requests_share_one_pipeline_run() {
	let retrieval = StaticRetrieval::with_delay(
		biohack_testkit::hits(&biohack_testkit::records(3)),
		Duration::from_millis(50),
	);
	let service = biohack_testkit::service(ScriptedModel::agreeable(), retrieval.clone())
		.expect("Service must build.");
	let (first, second) = tokio::join!(service.search("REM sleep?"), service.search(" REM sleep "));
	let first = first.expect("First search must succeed.");
	let second = second.expect("Second search must succeed.");

	assert_eq!(retrieval.calls(), 1);
	assert_eq!(first.question, "REM sleep");
	assert_eq!(second.question, "REM sleep");
	assert_eq!(first.count_experiences, 3);
	assert_eq!(second.count_experiences, 3);

	service.search("REM sleep").await.expect("Cached search must succeed.");

	assert_eq!(retrieval.calls(), 1);
}

#[tokio::test]
async fn retrieval_failure_leaves_the_key_absent() {
	let service =
		biohack_testkit::service(ScriptedModel::agreeable(), StaticRetrieval::failing(503))
			.expect("Service must build.");
	let err = service.search("fatigue").await.expect_err("Search must fail.");

	assert!(matches!(err, Error::Retrieval { .. }));
	assert_eq!(
		service.cache.state(&CacheKey::Taxonomy("fatigue".to_string())),
		CacheState::NotStarted
	);
	assert_eq!(service.poll_search("fatigue").relevance_polling, RelevancePolling::NotStarted);
	assert_eq!(service.poll_summary("fatigue").summary_polling, SummaryPolling::Off);
}

#[tokio::test]
async fn empty_taxonomy_is_not_cached() {
	let model = ScriptedModel::new(|_| ScriptedReply::ok(biohack_testkit::verdict(false)));
	let retrieval = StaticRetrieval::new(biohack_testkit::hits(&biohack_testkit::records(2)));
	let service =
		biohack_testkit::service(model, retrieval.clone()).expect("Service must build.");
	let response = service.search("gout").await.expect("Search must succeed.");

	assert_eq!(response.relevance_polling, RelevancePolling::NotStarted);
	assert_eq!(response.count_experiences, 0);
	assert!(response.categories.is_none());

	service.search("gout").await.expect("Search must succeed.");

	assert_eq!(retrieval.calls(), 2);
	assert_eq!(service.poll_summary("gout").summary_polling, SummaryPolling::Off);
}

#[tokio::test]
async fn summary_is_enriched_in_the_background() {
	let hits = vec![
		RecordBuilder::new("/r/a").hit(),
		RecordBuilder::new("/r/b").outcome("Fewer headaches").topic(Some("Riboflavin")).hit(),
	];
	let model = ScriptedModel::agreeable();
	let service = biohack_testkit::service(model.clone(), StaticRetrieval::new(hits))
		.expect("Service must build.");

	service.search("migraine?").await.expect("Search must succeed.");

	let summary = settle_summary(&service, "migraine").await;

	assert_eq!(summary.summary_polling, SummaryPolling::Finished);
	assert_eq!(summary.balance, vec!["<b>balance</b> item".to_string()]);
	assert_eq!(summary.skeptical, vec!["<b>skeptical</b> item".to_string()]);
	assert_eq!(summary.curious, vec!["<b>curious</b> item".to_string()]);
	assert_eq!(summary.mechanisms.len(), 2);
	assert_eq!(model.call_count("mechanisms"), 2);
	assert_eq!(model.call_count("balance"), 1);

	let again = service.poll_summary("migraine");

	assert_eq!(again.summary_polling, SummaryPolling::Finished);
	assert_eq!(model.call_count("balance"), 1);
	assert_eq!(service.poll_search("migraine").summary_polling, SummaryPolling::Finished);
}

#[tokio::test]
async fn vacuous_summary_is_reported_once_then_retried() {
	let model = ScriptedModel::new(|call| match call.schema_name.as_str() {
		"pertinence" => ScriptedReply::ok(biohack_testkit::verdict(true)),
		_ => ScriptedReply::ok(biohack_testkit::items(&[])),
	});
	let retrieval = StaticRetrieval::new(biohack_testkit::hits(&biohack_testkit::records(1)));
	let service = biohack_testkit::service(model.clone(), retrieval).expect("Service must build.");

	service.search("brain fog").await.expect("Search must succeed.");

	let failed = settle_summary(&service, "brain fog").await;

	assert_eq!(failed.summary_polling, SummaryPolling::FinishedDueToError);
	assert!(failed.error.is_some());
	assert!(failed.balance.is_empty());
	assert_eq!(model.call_count("balance"), 1);

	let retried = settle_summary(&service, "brain fog").await;

	assert_eq!(retried.summary_polling, SummaryPolling::FinishedDueToError);
	assert_eq!(model.call_count("balance"), 2);
	assert_eq!(
		service.cache.state(&CacheKey::Taxonomy("brain fog".to_string())),
		CacheState::Ready
	);
}

#[tokio::test]
async fn summary_without_curious_items_is_an_error_and_retried() {
	let model = ScriptedModel::new(|call| match call.schema_name.as_str() {
		"pertinence" => ScriptedReply::ok(biohack_testkit::verdict(true)),
		"curious" => ScriptedReply::err(biohack_providers::Error::ContentPolicy {
			message: "filtered".to_string(),
		}),
		_ => ScriptedReply::ok(biohack_testkit::items(&["<b>Creatine</b> item"])),
	});
	let retrieval = StaticRetrieval::new(biohack_testkit::hits(&biohack_testkit::records(1)));
	let service = biohack_testkit::service(model.clone(), retrieval).expect("Service must build.");

	service.search("memory").await.expect("Search must succeed.");

	let failed = settle_summary(&service, "memory").await;

	assert_eq!(failed.summary_polling, SummaryPolling::FinishedDueToError);
	assert!(failed.error.is_some());
	assert_eq!(model.call_count("curious"), 1);

	let retried = settle_summary(&service, "memory").await;

	assert_eq!(retried.summary_polling, SummaryPolling::FinishedDueToError);
	assert_eq!(model.call_count("curious"), 2);
}

#[test]
fn service_builds_with_http_providers() {
	let cfg = biohack_testkit::test_config().expect("Test config must parse.");
	let service = Arc::new(BiohackService::new(cfg).expect("HTTP providers must build."));

	assert_eq!(service.poll_summary("sleep").summary_polling, SummaryPolling::Off);
}

#[tokio::test]
async fn blank_questions_are_client_errors() {
	let service = biohack_testkit::service(
		ScriptedModel::agreeable(),
		StaticRetrieval::new(Vec::new()),
	)
	.expect("Service must build.");

	assert!(matches!(service.search("  ?").await, Err(Error::InvalidRequest { .. })));

	let search = service.poll_search(" ");

	assert_eq!(search.relevance_polling, RelevancePolling::NotStarted);
	assert!(search.error.is_some());

	let summary = service.poll_summary("?");

	assert_eq!(summary.summary_polling, SummaryPolling::Off);
	assert!(summary.error.is_some());
}
