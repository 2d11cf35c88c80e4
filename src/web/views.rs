use leptos::prelude::*;

use super::dashboard::{Cell, GridRow, OccupancyGrid, SweeperStatus};

const STYLE: &str = include_str!("../style.css");

pub(super) fn render_page(grid: &OccupancyGrid, sweeper: &SweeperStatus) -> String {
    let date = grid.date.format("%Y-%m-%d").to_string();
    let title = format!("Stadium occupancy, {date}");
    let grid_html = render_grid(grid);
    let sweeper_status = match &sweeper.last {
        Some(report) => format!(
            "Last sweep: {} ({} bookings before {} removed)",
            report.at.format("%Y-%m-%d %H:%M:%S %Z"),
            report.removed,
            report.cutoff
        ),
        None => "Sweeper: waiting for first run...".to_string(),
    };
    let schedule = format!(
        "Runs every {}s, day boundary in {}",
        sweeper.interval_secs, sweeper.timezone
    );

    view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <title>"Stadium Allocator"</title>
                <style>{STYLE}</style>
            </head>
            <body>
                <h1>{title}</h1>
                <form method="get" action="/">
                    <input type="date" name="date" value=date />
                    <button type="submit">"Show"</button>
                </form>
                <section>
                    <h2>"Occupancy"</h2>
                    <div inner_html=grid_html />
                </section>
                <section>
                    <h2>"Expiry Sweeper"</h2>
                    <p class="sweeper-status">{sweeper_status}</p>
                    <p class="timestamp">{schedule}</p>
                </section>
            </body>
        </html>
    }
    .to_html()
}

fn render_grid(grid: &OccupancyGrid) -> String {
    if grid.stadiums.is_empty() || grid.rows.is_empty() {
        return view! { <p class="empty">"No stadiums or time slots configured."</p> }.to_html();
    }

    let header_html: String = std::iter::once("Time".to_string())
        .chain(grid.stadiums.iter().cloned())
        .map(|name| view! { <th>{name}</th> }.to_html())
        .collect();
    let rows_html: String = grid.rows.iter().map(render_row).collect();

    view! {
        <table>
            <thead>
                <tr inner_html=header_html />
            </thead>
            <tbody inner_html=rows_html />
        </table>
    }
    .to_html()
}

fn render_row(row: &GridRow) -> String {
    let time = row.time.clone();
    let cells_html: String = std::iter::once(view! { <td class="time">{time}</td> }.to_html())
        .chain(row.cells.iter().map(render_cell))
        .collect();
    view! { <tr inner_html=cells_html /> }.to_html()
}

fn render_cell(cell: &Cell) -> String {
    let (text, css) = match cell {
        Cell::Free => ("Free".to_string(), "slot free"),
        Cell::Disabled => ("Disabled".to_string(), "slot disabled"),
        Cell::Booked(who) => (format!("Booked: {who}"), "slot booked"),
        Cell::Match {
            label,
            players,
            max_players,
            status,
        } => (
            format!("{label} ({players}/{max_players}, {status})"),
            "slot match",
        ),
    };
    let css = css.to_string();
    view! { <td class=css>{text}</td> }.to_html()
}
