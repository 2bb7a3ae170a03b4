//! End-to-end engine runs over mock collaborators.
//!
//! Covers the engine's observable guarantees: lookup dedup, tri-state
//! verification outcomes, per-tracker failure isolation, dry-run
//! parity, the global injection budget, and idempotent re-runs.

use std::sync::Arc;

use xseedr_core::config::{
    Config, DatabaseConfig, IndexConfig, RequestMode, RunConfig, TrackerConfig, XSEED_TAG,
};
use xseedr_core::testing::{
    torrent_info_hash, MockDownload, MockIndexClient, MockTorrentClient, MockTracker,
    MockTrackerProvider,
};
use xseedr_core::{
    CandidateHit, Engine, IndexClient, MirrorStore, SiteRecord, SqliteMirror, TorrentClient,
    TorrentFileEntry, TorrentInfo, TorrentState, TrackerProvider,
};

// ---- fixtures ----

fn single_file_torrent(name: &str, length: u64) -> Vec<u8> {
    let info = format!(
        "6:lengthi{}e4:name{}:{}12:piece lengthi262144e6:pieces20:aaaaaaaaaaaaaaaaaaaa",
        length,
        name.len(),
        name
    );
    format!("d8:announce17:http://a/announce4:infod{}ee", info).into_bytes()
}

fn multi_file_torrent(name: &str, files: &[(&str, u64)]) -> Vec<u8> {
    let mut list = String::new();
    for (path, length) in files {
        list.push_str(&format!(
            "d6:lengthi{}e4:pathl{}:{}ee",
            length,
            path.len(),
            path
        ));
    }
    let info = format!(
        "5:filesl{}e4:name{}:{}12:piece lengthi262144e6:pieces20:aaaaaaaaaaaaaaaaaaaa",
        list,
        name.len(),
        name
    );
    format!("d8:announce17:http://a/announce4:infod{}ee", info).into_bytes()
}

fn seeding(hash: &str, name: &str, size: u64, content_path: &str) -> TorrentInfo {
    TorrentInfo {
        hash: hash.to_string(),
        name: name.to_string(),
        state: TorrentState::Seeding,
        progress: 1.0,
        size_bytes: size,
        content_path: content_path.to_string(),
        save_path: Some("/downloads".to_string()),
        category: None,
        tags: Vec::new(),
        tracker_domain: "tracker.example".to_string(),
        last_activity_at: None,
    }
}

fn files(entries: &[(&str, u64)]) -> Vec<TorrentFileEntry> {
    entries
        .iter()
        .map(|(path, size)| TorrentFileEntry {
            path: path.to_string(),
            size_bytes: *size,
        })
        .collect()
}

fn hit(info_hash: &str, site_id: i64, remote_id: i64) -> CandidateHit {
    CandidateHit {
        info_hash: info_hash.to_string(),
        site_id,
        remote_id,
    }
}

fn permissive_run() -> RunConfig {
    RunConfig {
        min_torrent_size: -1,
        ..RunConfig::default()
    }
}

fn test_config(tracker_names: &[&str], run: RunConfig) -> Config {
    Config {
        index: IndexConfig {
            token: "test-token".to_string(),
            base_url: "https://index.test".to_string(),
            request_mode: RequestMode::Forced,
            staleness_secs: 7200,
            timeout_secs: 30,
        },
        database: DatabaseConfig::default(),
        clients: Vec::new(),
        trackers: tracker_names
            .iter()
            .map(|name| TrackerConfig {
                name: name.to_string(),
                url: format!("https://{}.test/", name),
                cookie: String::new(),
                download_page: "download.php?id={id}".to_string(),
                disabled: false,
                timeout_secs: 30,
            })
            .collect(),
        run,
    }
}

fn registry_site(site_id: i64, name: &str) -> SiteRecord {
    SiteRecord {
        site_id,
        name: name.to_string(),
        nickname: String::new(),
        url: String::new(),
        download_page: "download.php?id={id}".to_string(),
    }
}

fn build_engine(
    config: Config,
    clients: &[Arc<MockTorrentClient>],
    provider: MockTrackerProvider,
    index: &Arc<MockIndexClient>,
    mirror: &Arc<SqliteMirror>,
) -> Engine {
    Engine::new(
        config,
        clients
            .iter()
            .map(|c| c.clone() as Arc<dyn TorrentClient>)
            .collect(),
        Arc::new(provider) as Arc<dyn TrackerProvider>,
        index.clone() as Arc<dyn IndexClient>,
        mirror.clone() as Arc<dyn MirrorStore>,
    )
}

/// One client with one seeding target and one candidate scripted on
/// tracker "redwood" (site id 1, remote id 101).
struct SingleCandidateSetup {
    client: Arc<MockTorrentClient>,
    tracker: Arc<MockTracker>,
    engine: Engine,
    candidate_hash: String,
}

async fn single_candidate_setup(candidate_bytes: Vec<u8>, run: RunConfig) -> SingleCandidateSetup {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Show.S01", 300, "/downloads/Show.S01"),
            files(&[("Show.S01/ep1.mkv", 100), ("Show.S01/ep2.mkv", 200)]),
        )
        .await;

    let candidate_hash = torrent_info_hash(&candidate_bytes).expect("fixture must parse");

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index
        .set_candidates("target01", vec![hit(&candidate_hash, 1, 101)])
        .await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    tracker.respond(101, MockDownload::Data(candidate_bytes)).await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let clients = vec![client.clone()];
    let engine = build_engine(
        test_config(&["redwood"], run),
        &clients,
        provider,
        &index,
        &mirror,
    );

    SingleCandidateSetup {
        client,
        tracker,
        engine,
        candidate_hash,
    }
}

// ---- tests ----

#[tokio::test]
async fn full_match_injects_with_target_save_path() {
    let candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    let setup = single_candidate_setup(candidate, permissive_run()).await;

    let report = setup.engine.run().await.unwrap();

    assert_eq!(report.counters.targets_touched, 1);
    assert_eq!(report.counters.injection_attempts, 1);
    assert_eq!(report.counters.injection_successes, 1);
    assert!(!report.halted_by_budget);

    let added = setup.client.added_torrents().await;
    assert_eq!(added.len(), 1);
    let options = &added[0].options;
    assert_eq!(options.save_path.as_deref(), Some("/downloads"));
    assert!(options.tags.contains(&XSEED_TAG.to_string()));
    assert!(options.tags.contains(&"site:redwood".to_string()));
    // Fixture carries no private flag, so the public ratio cap applies.
    assert!(options.tags.contains(&"public".to_string()));
    assert!((options.ratio_limit - 2.0).abs() < f64::EPSILON);
    assert!(options.skip_hash_check);

    assert!(setup.client.has_torrent(&setup.candidate_hash).await);
}

#[tokio::test]
async fn root_folder_mismatch_is_not_injected() {
    // Same files and sizes, renamed root folder.
    let candidate = multi_file_torrent("Show.S01-OTHER", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    let setup = single_candidate_setup(candidate, permissive_run()).await;

    let report = setup.engine.run().await.unwrap();

    // The download happened, but no injection.
    assert_eq!(setup.tracker.request_count().await, 1);
    assert_eq!(report.counters.injection_attempts, 0);
    assert_eq!(report.counters.injection_successes, 0);
    assert!(setup.client.added_torrents().await.is_empty());
}

#[tokio::test]
async fn structural_mismatch_is_not_injected() {
    let candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 999)]);
    let setup = single_candidate_setup(candidate, permissive_run()).await;

    let report = setup.engine.run().await.unwrap();

    assert_eq!(report.counters.injection_attempts, 0);
    assert!(setup.client.added_torrents().await.is_empty());
}

#[tokio::test]
async fn private_candidate_gets_no_ratio_limit() {
    let mut candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    // Append the private flag inside the info dict: the encoder emits
    // keys in sorted order, so splice before the final dict close.
    let insert_at = candidate.len() - 2;
    candidate.splice(insert_at..insert_at, b"7:privatei1e".iter().copied());

    let setup = single_candidate_setup(candidate, permissive_run()).await;
    setup.engine.run().await.unwrap();

    let added = setup.client.added_torrents().await;
    assert_eq!(added.len(), 1);
    assert!(added[0].options.tags.contains(&"private".to_string()));
    assert!(!added[0].options.tags.contains(&"public".to_string()));
    assert!((added[0].options.ratio_limit - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn lookup_request_set_dedups_by_size_and_content_path() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(seeding("t1", "A", 100, "/d/x"), files(&[("A", 100)]))
        .await;
    client
        .add_mock_torrent(seeding("t2", "B", 100, "/d/x"), files(&[("B", 100)]))
        .await;
    client
        .add_mock_torrent(seeding("t3", "C", 100, "/d/y"), files(&[("C", 100)]))
        .await;
    client
        .add_mock_torrent(seeding("t4", "D", 200, "/d/z"), files(&[("D", 200)]))
        .await;

    let index = Arc::new(MockIndexClient::new());
    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let clients = vec![client];
    let engine = build_engine(
        test_config(&[], permissive_run()),
        &clients,
        MockTrackerProvider::new(),
        &index,
        &mirror,
    );

    engine.run().await.unwrap();

    let pages = index.lookup_pages().await;
    assert_eq!(pages.len(), 1);
    let requested = &pages[0];
    // One representative per (size, content path): t4, one of t1/t2, t3.
    assert_eq!(requested.len(), 3);
    assert!(requested.contains(&"t4".to_string()));
    assert!(requested.contains(&"t3".to_string()));
    assert!(requested.contains(&"t1".to_string()));
    assert!(!requested.contains(&"t2".to_string()));
}

#[tokio::test]
async fn breaker_suppresses_tracker_after_consecutive_failures() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Content", 100, "/downloads/Content"),
            files(&[("Content/a.mkv", 100)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    // Ten candidates, processed in order.
    index
        .set_candidates(
            "target01",
            (1..=10).map(|i| hit(&format!("c{:02}", i), 1, i)).collect(),
        )
        .await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    for id in [1, 2, 4, 5, 7, 8, 9] {
        tracker
            .respond(id, MockDownload::Error("connection reset".to_string()))
            .await;
    }
    tracker.respond(3, MockDownload::NotFound).await;
    // A successful download that does not match the target.
    tracker
        .respond(6, MockDownload::Data(single_file_torrent("other.mkv", 5)))
        .await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let run = RunConfig {
        max_consecutive_failures: 2,
        ..permissive_run()
    };
    let clients = vec![client];
    let engine = build_engine(
        test_config(&["redwood"], run),
        &clients,
        provider,
        &index,
        &mirror,
    );

    engine.run().await.unwrap();

    // Failures at 1,2 (streak 2), reset by not-found at 3, failures at
    // 4,5 (streak 2), reset by the successful download at 6, then
    // failures at 7,8,9 push the streak past the threshold; candidate
    // 10 is never attempted.
    assert_eq!(
        tracker.requested_ids().await,
        vec![1, 2, 3, 4, 5, 6, 7, 8, 9]
    );
}

#[tokio::test]
async fn breaker_threshold_zero_blocks_after_first_failure() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Content", 100, "/downloads/Content"),
            files(&[("Content/a.mkv", 100)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index
        .set_candidates(
            "target01",
            vec![hit("c01", 1, 1), hit("c02", 1, 2), hit("c03", 1, 3)],
        )
        .await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    tracker
        .respond(1, MockDownload::Error("timeout".to_string()))
        .await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let run = RunConfig {
        max_consecutive_failures: 0,
        ..permissive_run()
    };
    let clients = vec![client];
    let engine = build_engine(
        test_config(&["redwood"], run),
        &clients,
        provider,
        &index,
        &mirror,
    );

    engine.run().await.unwrap();
    assert_eq!(tracker.requested_ids().await, vec![1]);
}

#[tokio::test]
async fn dry_run_counts_like_live_run_but_never_mutates() {
    let candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);

    let live = single_candidate_setup(candidate.clone(), permissive_run()).await;
    let live_report = live.engine.run().await.unwrap();

    let dry = single_candidate_setup(
        candidate,
        RunConfig {
            dry_run: true,
            ..permissive_run()
        },
    )
    .await;
    let dry_report = dry.engine.run().await.unwrap();

    assert_eq!(dry_report.counters, live_report.counters);
    assert_eq!(dry_report.counters.injection_successes, 1);

    // The dry run still downloaded and verified, but issued no
    // client-mutating call.
    assert_eq!(dry.tracker.request_count().await, 1);
    assert_eq!(dry.client.mutation_count().await, 0);
    assert_eq!(live.client.mutation_count().await, 1);
}

#[tokio::test]
async fn injection_budget_halts_run_across_clients() {
    let bytes_a = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    let bytes_b = single_file_torrent("Movie.mkv", 400);
    let hash_a = torrent_info_hash(&bytes_a).unwrap();
    let hash_b = torrent_info_hash(&bytes_b).unwrap();

    let client_a = Arc::new(MockTorrentClient::new("first"));
    client_a
        .add_mock_torrent(
            seeding("targetaa", "Show.S01", 300, "/downloads/Show.S01"),
            files(&[("Show.S01/ep1.mkv", 100), ("Show.S01/ep2.mkv", 200)]),
        )
        .await;
    let client_b = Arc::new(MockTorrentClient::new("second"));
    client_b
        .add_mock_torrent(
            seeding("targetbb", "Movie.mkv", 400, "/downloads/Movie.mkv"),
            files(&[("Movie.mkv", 400)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index.set_candidates("targetaa", vec![hit(&hash_a, 1, 11)]).await;
    index.set_candidates("targetbb", vec![hit(&hash_b, 1, 22)]).await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    tracker.respond(11, MockDownload::Data(bytes_a)).await;
    tracker.respond(22, MockDownload::Data(bytes_b)).await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let run = RunConfig {
        max_injections: 1,
        ..permissive_run()
    };
    let clients = vec![client_a.clone(), client_b.clone()];
    let engine = build_engine(
        test_config(&["redwood"], run),
        &clients,
        provider,
        &index,
        &mirror,
    );

    let report = engine.run().await.unwrap();

    assert!(report.halted_by_budget);
    assert_eq!(report.counters.injection_successes, 1);
    assert_eq!(tracker.request_count().await, 1);
    assert_eq!(client_a.added_torrents().await.len(), 1);
    assert!(client_b.added_torrents().await.is_empty());
}

#[tokio::test]
async fn rerun_against_unchanged_state_adds_nothing() {
    let candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    let setup = single_candidate_setup(candidate, permissive_run()).await;

    let first = setup.engine.run().await.unwrap();
    assert_eq!(first.counters.injection_successes, 1);
    assert_eq!(setup.client.added_torrents().await.len(), 1);

    let second = setup.engine.run().await.unwrap();
    assert_eq!(second.counters.injection_attempts, 0);
    assert_eq!(second.counters.injection_successes, 0);

    // Still exactly one add; the candidate was recognized as held and
    // its tags were already correct, so reconciliation was a no-op.
    assert_eq!(setup.client.added_torrents().await.len(), 1);
    assert!(setup.client.tag_changes().await.is_empty());
    // The second run never re-downloaded the candidate.
    assert_eq!(setup.tracker.request_count().await, 1);
}

#[tokio::test]
async fn unreachable_client_is_isolated() {
    let down = Arc::new(MockTorrentClient::new("down"));
    down.set_unreachable(true).await;

    let bytes = single_file_torrent("Movie.mkv", 400);
    let hash = torrent_info_hash(&bytes).unwrap();
    let up = Arc::new(MockTorrentClient::new("up"));
    up.add_mock_torrent(
        seeding("targetbb", "Movie.mkv", 400, "/downloads/Movie.mkv"),
        files(&[("Movie.mkv", 400)]),
    )
    .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index.set_candidates("targetbb", vec![hit(&hash, 1, 22)]).await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    tracker.respond(22, MockDownload::Data(bytes)).await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let clients = vec![down, up.clone()];
    let engine = build_engine(
        test_config(&["redwood"], permissive_run()),
        &clients,
        provider,
        &index,
        &mirror,
    );

    let report = engine.run().await.unwrap();

    assert_eq!(report.clients_processed, 1);
    assert_eq!(up.added_torrents().await.len(), 1);
}

#[tokio::test]
async fn already_held_candidate_is_reconciled_even_when_tracker_excluded() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Content", 100, "/downloads/Content"),
            files(&[("Content/a.mkv", 100)]),
        )
        .await;
    // The candidate is already in the client, tagged for a tracker
    // that no longer matches.
    let mut held = seeding("cand0001", "Content", 100, "/downloads/Content");
    held.tags = vec!["site:oldwood".to_string()];
    client
        .add_mock_torrent(held, files(&[("Content/a.mkv", 100)]))
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index
        .set_candidates("target01", vec![hit("cand0001", 1, 500)])
        .await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let run = RunConfig {
        exclude_trackers: vec!["redwood".to_string()],
        ..permissive_run()
    };
    let clients = vec![client.clone()];
    let engine = build_engine(
        test_config(&["redwood"], run),
        &clients,
        provider,
        &index,
        &mirror,
    );

    engine.run().await.unwrap();

    // Tag reconciliation happened despite the exclusion, and no
    // network call was made.
    let changes = client.tag_changes().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].hash, "cand0001");
    assert!(changes[0].added.contains(&XSEED_TAG.to_string()));
    assert!(changes[0].added.contains(&"site:redwood".to_string()));
    assert_eq!(changes[0].removed, vec!["site:oldwood".to_string()]);
    assert_eq!(tracker.request_count().await, 0);
    assert!(client.added_torrents().await.is_empty());
}

#[tokio::test]
async fn unresolved_site_is_skipped_silently() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Content", 100, "/downloads/Content"),
            files(&[("Content/a.mkv", 100)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    // Site id 99 has no local tracker.
    index
        .set_candidates("target01", vec![hit("c01", 99, 1)])
        .await;

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let clients = vec![client.clone()];
    let engine = build_engine(
        test_config(&["redwood"], permissive_run()),
        &clients,
        provider,
        &index,
        &mirror,
    );

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.targets_touched, 1);
    assert_eq!(report.counters.injection_attempts, 0);
    assert_eq!(tracker.request_count().await, 0);
    assert!(client.added_torrents().await.is_empty());
}

#[tokio::test]
async fn skip_mode_uses_mirror_without_querying_index() {
    let candidate = multi_file_torrent("Show.S01", &[("ep1.mkv", 100), ("ep2.mkv", 200)]);
    let candidate_hash = torrent_info_hash(&candidate).unwrap();

    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Show.S01", 300, "/downloads/Show.S01"),
            files(&[("Show.S01/ep1.mkv", 100), ("Show.S01/ep2.mkv", 200)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());

    // Pre-seed the mirror as a previous run would have left it.
    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    mirror.replace_sites(&[registry_site(1, "redwood")]).unwrap();
    let mut groups = std::collections::HashMap::new();
    groups.insert(
        "target01".to_string(),
        vec![hit(&candidate_hash, 1, 101)],
    );
    mirror.replace_candidates(&groups).unwrap();

    let mut provider = MockTrackerProvider::new();
    let tracker = provider.tracker_mock("redwood");
    tracker.respond(101, MockDownload::Data(candidate)).await;

    let mut config = test_config(&["redwood"], permissive_run());
    config.index.request_mode = RequestMode::Skip;

    let clients = vec![client.clone()];
    let engine = build_engine(config, &clients, provider, &index, &mirror);

    let report = engine.run().await.unwrap();

    assert!(index.lookup_pages().await.is_empty());
    assert_eq!(report.counters.injection_successes, 1);
    assert_eq!(client.added_torrents().await.len(), 1);
}

#[tokio::test]
async fn failed_refresh_leaves_staleness_unchanged() {
    let client = Arc::new(MockTorrentClient::new("seedbox"));
    client
        .add_mock_torrent(
            seeding("target01", "Content", 100, "/downloads/Content"),
            files(&[("Content/a.mkv", 100)]),
        )
        .await;

    let index = Arc::new(MockIndexClient::new());
    index.set_sites(vec![registry_site(1, "redwood")]).await;
    index.set_fail_lookups(true).await;

    let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
    let clients = vec![client];
    let engine = build_engine(
        test_config(&["redwood"], permissive_run()),
        &clients,
        MockTrackerProvider::new(),
        &index,
        &mirror,
    );

    engine.run().await.unwrap();

    // Every lookup page failed, so the mirror still counts as never
    // refreshed.
    assert_eq!(mirror.last_refresh().unwrap(), None);
    assert!(!index.lookup_pages().await.is_empty());
}
