//! Card-play frequencies pulled out of BGA game logs.
//!
//! Log actions look like `msiebert plays Giant Tortoise for 3 and places it...`.
//! Only lines of that shape count; ids such as `card_042` and standard
//! projects are skipped.

use crate::domain::model::Record;
use crate::utils::error::{Result, StatsError};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::LazyLock;

static PLAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+) plays ([A-Z][^0-9]+?)(?:\s+for \d+|\s*$)").expect("valid play pattern")
});

static TRAILING_FOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+for$").expect("valid trailing pattern"));

const ID_MARKER: &str = "card_";
const STANDARD_PROJECT: &str = "standard project";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPlay {
    pub player: String,
    pub card: String,
}

/// Parses one log action. `None` for anything that is not a named card play.
pub fn extract_play(action: &str) -> Option<CardPlay> {
    let caps = PLAY_PATTERN.captures(action)?;
    let player = caps.get(1)?.as_str();
    let card = TRAILING_FOR
        .replace(caps.get(2)?.as_str().trim(), "")
        .trim()
        .to_string();

    if card.is_empty()
        || card.contains(ID_MARKER)
        || card.to_lowercase().contains(STANDARD_PROJECT)
    {
        return None;
    }

    Some(CardPlay {
        player: player.to_string(),
        card,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardCount {
    pub card: String,
    pub plays: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCards {
    pub player: String,
    pub cards: Vec<String>,
}

/// Cards each player put down in one game, in play order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCards {
    pub table_id: String,
    pub players: Vec<PlayerCards>,
}

impl GameCards {
    fn entry(&mut self, player: &str) -> &mut Vec<String> {
        let index = match self.players.iter().position(|p| p.player == player) {
            Some(index) => index,
            None => {
                self.players.push(PlayerCards {
                    player: player.to_string(),
                    cards: Vec::new(),
                });
                self.players.len() - 1
            }
        };
        &mut self.players[index].cards
    }

    pub fn cards_of(&self, player: &str) -> Option<&[String]> {
        self.players
            .iter()
            .find(|p| p.player == player)
            .map(|p| p.cards.as_slice())
    }
}

impl Serialize for GameCards {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.players.len()))?;
        for p in &self.players {
            map.serialize_entry(&p.player, &p.cards)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardAnalysis {
    /// player → card → times played, over every game
    pub player_cards: BTreeMap<String, BTreeMap<String, u32>>,
    /// games in log order
    pub games: Vec<GameCards>,
}

impl CardAnalysis {
    /// Walks every `logEntries[].actions[]` line of every log record.
    pub fn from_logs(logs: &[Record]) -> Result<Self> {
        let mut analysis = Self::default();
        for (index, log) in logs.iter().enumerate() {
            let table_id = log.table_id().ok_or_else(|| {
                StatsError::malformed("game logs", format!("record #{} has no non-empty tableId", index))
            })?;
            analysis.add_game(table_id, log);
        }
        Ok(analysis)
    }

    fn add_game(&mut self, table_id: String, log: &Record) {
        let mut game = GameCards {
            table_id,
            players: Vec::new(),
        };

        if let Some(Value::Array(players)) = log.data.get("players") {
            for name in players.iter().filter_map(Value::as_str) {
                game.entry(name);
            }
        }

        for action in actions(log) {
            if let Some(play) = extract_play(action) {
                *self
                    .player_cards
                    .entry(play.player.clone())
                    .or_default()
                    .entry(play.card.clone())
                    .or_insert(0) += 1;
                game.entry(&play.player).push(play.card);
            }
        }

        self.games.push(game);
    }

    pub fn total_plays(&self) -> u32 {
        self.player_cards
            .values()
            .flat_map(|cards| cards.values())
            .sum()
    }

    /// Cards played at least `min_plays` times, most played first, ties by name.
    pub fn top_cards(&self, player: &str, min_plays: u32) -> Vec<CardCount> {
        let Some(cards) = self.player_cards.get(player) else {
            return Vec::new();
        };

        let mut ranked: Vec<CardCount> = cards
            .iter()
            .filter(|(_, &plays)| plays >= min_plays)
            .map(|(card, &plays)| CardCount {
                card: card.clone(),
                plays,
            })
            .collect();
        ranked.sort_by(|a, b| b.plays.cmp(&a.plays).then_with(|| a.card.cmp(&b.card)));
        ranked
    }

    pub fn report(&self, options: &RankingOptions, generated_at: String) -> CardReport {
        let players: Vec<String> = if options.tracked_players.is_empty() {
            self.player_cards.keys().cloned().collect()
        } else {
            options
                .tracked_players
                .iter()
                .filter(|p| self.player_cards.contains_key(p.as_str()))
                .cloned()
                .collect()
        };

        let top_cards_by_player = players
            .into_iter()
            .map(|player| {
                let cards = self.top_cards(&player, options.min_plays);
                PlayerRanking { player, cards }
            })
            .collect();

        CardReport {
            generated_at,
            cards_per_game: self.games.clone(),
            top_cards_by_player,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingOptions {
    /// Empty means every player seen in the logs.
    pub tracked_players: Vec<String>,
    pub min_plays: u32,
    pub top_n: usize,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            tracked_players: Vec::new(),
            min_plays: 2,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRanking {
    pub player: String,
    pub cards: Vec<CardCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardReport {
    pub generated_at: String,
    #[serde(serialize_with = "games_as_map")]
    pub cards_per_game: Vec<GameCards>,
    #[serde(serialize_with = "rankings_as_map")]
    pub top_cards_by_player: Vec<PlayerRanking>,
}

fn games_as_map<S: Serializer>(games: &[GameCards], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(games.len()))?;
    for game in games {
        map.serialize_entry(&game.table_id, game)?;
    }
    map.end()
}

fn rankings_as_map<S: Serializer>(
    rankings: &[PlayerRanking],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(rankings.len()))?;
    for ranking in rankings {
        map.serialize_entry(&ranking.player, &ranking.cards)?;
    }
    map.end()
}

impl CardReport {
    /// Console summary: the first few games, then each player's top cards.
    pub fn render_summary(&self, preview_games: usize, top_n: usize) -> String {
        let mut out = String::from("=== CARDS PLAYED PER GAME ===\n");
        for game in self.cards_per_game.iter().take(preview_games) {
            out.push_str(&format!("\nGame {}:\n", game.table_id));
            for p in game.players.iter().filter(|p| !p.cards.is_empty()) {
                out.push_str(&format!("  {}: {}\n", p.player, p.cards.join(", ")));
            }
        }
        if self.cards_per_game.len() > preview_games {
            out.push_str(&format!(
                "\n... (showing first {} of {} games)\n",
                preview_games,
                self.cards_per_game.len()
            ));
        }

        out.push_str(&format!("\n=== TOP {} MOST PLAYED CARDS PER PLAYER ===\n", top_n));
        for ranking in &self.top_cards_by_player {
            out.push_str(&format!("\n{}:\n", ranking.player));
            for (idx, count) in ranking.cards.iter().take(top_n).enumerate() {
                out.push_str(&format!("  {}. {} ({} plays)\n", idx + 1, count.card, count.plays));
            }
        }
        out
    }

    /// One `player,card,plays` row per ranked card.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["player", "card", "plays"])?;
        for ranking in &self.top_cards_by_player {
            for count in &ranking.cards {
                let plays = count.plays.to_string();
                csv.write_record([ranking.player.as_str(), count.card.as_str(), plays.as_str()])?;
            }
        }
        csv.flush()?;
        Ok(())
    }
}

fn actions(log: &Record) -> impl Iterator<Item = &str> {
    log.data
        .get("logEntries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("actions").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(value: Value) -> Record {
        let Value::Object(data) = value else {
            panic!("log fixture must be an object")
        };
        Record::new(data)
    }

    #[test]
    fn test_extract_play_with_qualifier() {
        let play = extract_play("Alice plays Giant Tortoise for 3").unwrap();
        assert_eq!(play.player, "Alice");
        assert_eq!(play.card, "Giant Tortoise");
    }

    #[test]
    fn test_extract_play_with_trailing_clause() {
        let play = extract_play("msiebert plays Okapi for 6 and places it in enclosure").unwrap();
        assert_eq!(play.card, "Okapi");
    }

    #[test]
    fn test_extract_play_at_end_of_line() {
        let play = extract_play("AstroHood plays Science Lab  ").unwrap();
        assert_eq!(play.player, "AstroHood");
        assert_eq!(play.card, "Science Lab");
    }

    #[test]
    fn test_extract_play_excludes_ids_and_boilerplate() {
        assert_eq!(extract_play("Alice plays card_042"), None);
        assert_eq!(extract_play("Bob plays Standard Project Build"), None);
        assert_eq!(extract_play("Bob takes Association action"), None);
        assert_eq!(extract_play("Bob plays 3 cards"), None);
    }

    #[test]
    fn test_counts_and_per_game_order() {
        let logs = vec![
            log(json!({
                "tableId": "100",
                "players": ["Alice", "Bob"],
                "logEntries": [
                    {"actions": ["Alice plays Giant Tortoise for 3", "Bob plays Okapi for 6"]},
                    {"actions": ["Alice plays Lion for 9", "Alice plays card_042"]}
                ]
            })),
            log(json!({
                "tableId": "101",
                "logEntries": [{"actions": ["Alice plays Giant Tortoise for 3", 17]}]
            })),
        ];

        let analysis = CardAnalysis::from_logs(&logs).unwrap();

        assert_eq!(analysis.player_cards["Alice"]["Giant Tortoise"], 2);
        assert_eq!(analysis.player_cards["Alice"]["Lion"], 1);
        assert_eq!(analysis.player_cards["Bob"]["Okapi"], 1);
        assert_eq!(analysis.total_plays(), 4);

        assert_eq!(analysis.games.len(), 2);
        assert_eq!(
            analysis.games[0].cards_of("Alice").unwrap(),
            ["Giant Tortoise", "Lion"]
        );
        assert_eq!(analysis.games[1].cards_of("Bob"), None);
    }

    #[test]
    fn test_listed_players_are_seeded_even_without_plays() {
        let logs = vec![log(json!({
            "tableId": "7",
            "players": ["Alice", "Carol"],
            "logEntries": []
        }))];

        let analysis = CardAnalysis::from_logs(&logs).unwrap();
        assert_eq!(analysis.games[0].cards_of("Carol").unwrap().len(), 0);
        assert!(analysis.player_cards.is_empty());
    }

    #[test]
    fn test_log_without_table_id_is_rejected() {
        let logs = vec![log(json!({"logEntries": []}))];
        assert!(CardAnalysis::from_logs(&logs).is_err());
    }

    #[test]
    fn test_top_cards_ranking() {
        let mut analysis = CardAnalysis::default();
        let cards = analysis.player_cards.entry("Alice".to_string()).or_default();
        cards.insert("Lion".to_string(), 3);
        cards.insert("Okapi".to_string(), 3);
        cards.insert("Jaguar".to_string(), 5);
        cards.insert("Hyena".to_string(), 1);

        let ranked = analysis.top_cards("Alice", 2);
        let names: Vec<&str> = ranked.iter().map(|c| c.card.as_str()).collect();
        assert_eq!(names, vec!["Jaguar", "Lion", "Okapi"]);
        assert!(analysis.top_cards("Nobody", 1).is_empty());
    }

    #[test]
    fn test_ranking_ties_ignore_log_order() {
        let logs = vec![log(json!({
            "tableId": "300",
            "logEntries": [{"actions": [
                "Alice plays Okapi for 6",
                "Alice plays Okapi for 6",
                "Alice plays Lion for 9",
                "Alice plays Lion for 9"
            ]}]
        }))];
        let analysis = CardAnalysis::from_logs(&logs).unwrap();

        let ranked = analysis.top_cards("Alice", 1);
        let names: Vec<&str> = ranked.iter().map(|c| c.card.as_str()).collect();
        assert_eq!(names, vec!["Lion", "Okapi"]);
    }

    #[test]
    fn test_report_json_shape() {
        let logs = vec![log(json!({
            "tableId": "200",
            "players": ["Bob", "Alice"],
            "logEntries": [{"actions": [
                "Alice plays Lion for 9",
                "Alice plays Lion for 9",
                "Bob plays Okapi for 6"
            ]}]
        }))];
        let analysis = CardAnalysis::from_logs(&logs).unwrap();
        let options = RankingOptions {
            tracked_players: vec!["Alice".to_string(), "Zed".to_string()],
            min_plays: 2,
            top_n: 10,
        };

        let report = analysis.report(&options, "2025-01-01T00:00:00.000Z".to_string());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(
            value,
            json!({
                "generatedAt": "2025-01-01T00:00:00.000Z",
                "cardsPerGame": {"200": {"Bob": ["Okapi"], "Alice": ["Lion", "Lion"]}},
                "topCardsByPlayer": {"Alice": [{"card": "Lion", "plays": 2}]}
            })
        );
    }

    #[test]
    fn test_report_csv_and_summary() {
        let report = CardReport {
            generated_at: String::new(),
            cards_per_game: vec![GameCards {
                table_id: "1".to_string(),
                players: vec![PlayerCards {
                    player: "Alice".to_string(),
                    cards: vec!["Lion".to_string()],
                }],
            }],
            top_cards_by_player: vec![PlayerRanking {
                player: "Alice".to_string(),
                cards: vec![CardCount {
                    card: "Lion".to_string(),
                    plays: 4,
                }],
            }],
        };

        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "player,card,plays\nAlice,Lion,4\n");

        let summary = report.render_summary(5, 10);
        assert!(summary.contains("Game 1:\n  Alice: Lion"));
        assert!(summary.contains("  1. Lion (4 plays)"));
    }
}
