use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        render(&state),
    )
}

fn render(state: &AppState) -> String {
    let mut out = String::with_capacity(2048);
    let stats = &state.stats;

    writeln!(out, "# TYPE transcript_fetches counter").unwrap();
    writeln!(out, "# HELP transcript_fetches Completed fetches by result").unwrap();
    for (result, count) in stats.results() {
        writeln!(out, "transcript_fetches_total{{result=\"{}\"}} {}", result, count).unwrap();
    }

    writeln!(out, "# TYPE transcript_strategy_success counter").unwrap();
    writeln!(
        out,
        "# HELP transcript_strategy_success Fetches won by each strategy"
    )
    .unwrap();
    for (strategy, count) in stats.strategy_success() {
        writeln!(
            out,
            "transcript_strategy_success_total{{strategy=\"{}\"}} {}",
            strategy, count
        )
        .unwrap();
    }

    writeln!(out, "# TYPE transcript_strategy_failures counter").unwrap();
    writeln!(
        out,
        "# HELP transcript_strategy_failures Recorded strategy failures by kind"
    )
    .unwrap();
    for ((strategy, kind), count) in stats.strategy_failures() {
        writeln!(
            out,
            "transcript_strategy_failures_total{{strategy=\"{}\",kind=\"{}\"}} {}",
            strategy, kind, count
        )
        .unwrap();
    }

    writeln!(out, "# TYPE transcript_records gauge").unwrap();
    writeln!(out, "# HELP transcript_records Fetch records held in memory").unwrap();
    writeln!(out, "transcript_records {}", state.records.len()).unwrap();

    writeln!(out, "# EOF").unwrap();
    out
}
