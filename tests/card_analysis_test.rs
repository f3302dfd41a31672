use arknova_stats::{CardAnalysis, LocalStorage, MergeEngine, RankingOptions, RecordKind};
use serde_json::{json, Value};
use tempfile::TempDir;

fn logs_collection() -> Value {
    json!({
        "exportedAt": "2025-03-01T12:00:00.000Z",
        "totalLogs": 2,
        "logs": [
            {
                "tableId": "700",
                "players": ["msiebert", "AstroHood"],
                "logEntries": [
                    {"actions": [
                        "msiebert plays Giant Tortoise for 3 and places it in enclosure",
                        "AstroHood plays Sponsorship: Vaccination",
                        "msiebert plays card_017 for 2"
                    ]},
                    {"actions": ["msiebert plays Hyacinth Macaw for 2"]}
                ]
            },
            {
                "tableId": 701,
                "players": ["msiebert", "AstroHood"],
                "logEntries": [
                    {"actions": [
                        "msiebert plays Giant Tortoise for 3",
                        "AstroHood plays Standard Project Upgrade",
                        "AstroHood takes 2 money"
                    ]}
                ]
            }
        ]
    })
}

#[tokio::test]
async fn test_analyze_logs_collection_from_disk() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("docs/data")).unwrap();
    std::fs::write(
        root.join("docs/data/detailed_game_logs.json"),
        serde_json::to_vec_pretty(&logs_collection()).unwrap(),
    )
    .unwrap();

    let engine = MergeEngine::new(LocalStorage::new(root.to_string_lossy().into_owned()));
    let store = engine.store();
    let logs = store
        .load_collection(RecordKind::Logs, "docs/data/detailed_game_logs.json")
        .await
        .unwrap();

    let analysis = CardAnalysis::from_logs(&logs.records).unwrap();
    assert_eq!(analysis.total_plays(), 4);
    assert_eq!(analysis.player_cards["msiebert"]["Giant Tortoise"], 2);
    assert_eq!(
        analysis.player_cards["AstroHood"]["Sponsorship: Vaccination"],
        1
    );

    let report = analysis.report(
        &RankingOptions::default(),
        "2025-03-02T00:00:00.000Z".to_string(),
    );
    store
        .write_json(
            "docs/data/card_analysis.json",
            &serde_json::to_value(&report).unwrap(),
        )
        .await
        .unwrap();

    let written: Value = serde_json::from_slice(
        &std::fs::read(root.join("docs/data/card_analysis.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written["generatedAt"], "2025-03-02T00:00:00.000Z");
    assert_eq!(
        written["cardsPerGame"]["700"]["msiebert"],
        json!(["Giant Tortoise", "Hyacinth Macaw"])
    );
    assert_eq!(written["cardsPerGame"]["701"]["AstroHood"], json!([]));
    assert_eq!(
        written["topCardsByPlayer"]["msiebert"],
        json!([{"card": "Giant Tortoise", "plays": 2}])
    );
    assert_eq!(written["topCardsByPlayer"]["AstroHood"], json!([]));

    let mut csv = Vec::new();
    report.write_csv(&mut csv).unwrap();
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "player,card,plays\nmsiebert,Giant Tortoise,2\n"
    );
}

#[tokio::test]
async fn test_tracked_players_limit_the_ranking() {
    let logs: Vec<arknova_stats::Record> =
        serde_json::from_value(logs_collection()["logs"].clone()).unwrap();
    let analysis = CardAnalysis::from_logs(&logs).unwrap();

    let options = RankingOptions {
        tracked_players: vec!["AstroHood".to_string(), "nobody".to_string()],
        min_plays: 1,
        top_n: 10,
    };
    let report = analysis.report(&options, "now".to_string());

    assert_eq!(report.top_cards_by_player.len(), 1);
    assert_eq!(report.top_cards_by_player[0].player, "AstroHood");
    assert_eq!(report.top_cards_by_player[0].cards[0].card, "Sponsorship: Vaccination");

    let summary = report.render_summary(1, 3);
    assert!(summary.contains("Game 700:"));
    assert!(summary.contains("(showing first 1 of 2 games)"));
    assert!(summary.contains("1. Sponsorship: Vaccination (1 plays)"));
}
