use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Sparkline},
    Frame,
};

use super::cartpole_widget;
use super::training_dashboard::{DashboardState, TrainingStatus};

/// Render the full training dashboard.
pub fn render(frame: &mut Frame, dashboard: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    render_header(frame, dashboard, chunks[0]);
    render_main(frame, dashboard, chunks[1]);
    render_footer(frame, dashboard, chunks[2]);
}

fn render_header(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let status_str = match dashboard.status {
        TrainingStatus::Running => "RUNNING",
        TrainingStatus::Paused => "PAUSED",
        TrainingStatus::Finished => "FINISHED",
        TrainingStatus::Failed => "FAILED",
    };
    let status_color = match dashboard.status {
        TrainingStatus::Running => Color::Green,
        TrainingStatus::Paused => Color::Yellow,
        TrainingStatus::Finished => Color::Cyan,
        TrainingStatus::Failed => Color::Red,
    };

    let header_text = Line::from(vec![
        Span::styled(
            format!("Training: {} on CartPole", dashboard.algorithm),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::raw(format!(
            "Episode: {}/{}",
            dashboard.episode, dashboard.total_episodes
        )),
        Span::raw("  |  ["),
        Span::styled(
            status_str,
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(header_text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(header, area);
}

fn render_main(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    // Split into left (charts) and right (cart-pole + stats) panels
    let main_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_left_panel(frame, dashboard, main_cols[0]);
    render_right_panel(frame, dashboard, main_cols[1]);
}

fn render_left_panel(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let left_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45), // Reward chart
            Constraint::Percentage(30), // Loss chart
            Constraint::Length(3),      // Episode length sparkline
            Constraint::Length(3),      // Progress gauge
        ])
        .split(area);

    render_reward_chart(frame, dashboard, left_rows[0]);
    render_loss_chart(frame, dashboard, left_rows[1]);
    render_length_sparkline(frame, dashboard, left_rows[2]);
    render_progress_gauge(frame, dashboard, left_rows[3]);
}

fn render_right_panel(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let right_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_live_cartpole(frame, dashboard, right_rows[0]);
    render_stats_panel(frame, dashboard, right_rows[1]);
}

fn render_reward_chart(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let reward_data: Vec<(f64, f64)> = dashboard.reward_history.iter().copied().collect();
    let avg_data: Vec<(f64, f64)> = dashboard.average_reward_history.iter().copied().collect();
    let eval_data: Vec<(f64, f64)> = dashboard.eval_history.iter().copied().collect();

    let (x_min, x_max) = x_bounds(&reward_data, &eval_data, dashboard.total_episodes);
    // Round up to the next multiple of 50
    let y_max = ((dashboard.max_reward() / 50.0).ceil() * 50.0).max(50.0);

    let mut datasets = vec![];
    if !reward_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Episode Reward")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::DarkGray))
                .data(&reward_data),
        );
    }
    if !avg_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Moving Average")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Green))
                .data(&avg_data),
        );
    }
    if !eval_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Greedy Eval")
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Cyan))
                .data(&eval_data),
        );
    }

    let x_labels = vec![
        Span::raw(format!("{}", x_min as usize)),
        Span::raw(format!("{}", x_max as usize)),
    ];
    let y_labels = vec![
        Span::raw("0"),
        Span::raw(format!("{}", (y_max / 2.0) as usize)),
        Span::raw(format!("{}", y_max as usize)),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Reward"))
        .x_axis(
            Axis::default()
                .title("Episode")
                .labels(x_labels)
                .bounds([x_min, x_max]),
        )
        .y_axis(
            Axis::default()
                .title("Reward")
                .labels(y_labels)
                .bounds([0.0, y_max]),
        );

    frame.render_widget(chart, area);
}

fn render_loss_chart(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let loss_data: Vec<(f64, f64)> = dashboard.loss_history.iter().copied().collect();

    let (x_min, x_max) = if let (Some(first), Some(last)) = (loss_data.first(), loss_data.last())
    {
        (first.0, last.0.max(first.0 + 1.0))
    } else {
        (0.0, dashboard.total_episodes.max(1) as f64)
    };

    let y_max = loss_data
        .iter()
        .map(|&(_, y)| y)
        .filter(|y| y.is_finite())
        .fold(0.1_f64, f64::max);
    // Round up to nearest 0.1
    let y_max = ((y_max * 10.0).ceil() / 10.0).max(0.1);

    let mut datasets = vec![];
    if !loss_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Loss")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&loss_data),
        );
    }

    let x_labels = vec![
        Span::raw(format!("{}", x_min as usize)),
        Span::raw(format!("{}", x_max as usize)),
    ];
    let y_labels = vec![Span::raw("0"), Span::raw(format!("{:.2}", y_max))];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Soft Q Loss"))
        .x_axis(
            Axis::default()
                .title("Episode")
                .labels(x_labels)
                .bounds([x_min, x_max]),
        )
        .y_axis(
            Axis::default()
                .title("MSE")
                .labels(y_labels)
                .bounds([0.0, y_max]),
        );

    frame.render_widget(chart, area);
}

fn render_length_sparkline(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let data: Vec<u64> = dashboard.episode_length_history.iter().copied().collect();
    let last = data.last().copied().unwrap_or(0);

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Episode Length (last: {})", last)),
        )
        .data(&data)
        .style(Style::default().fg(Color::Magenta));

    frame.render_widget(sparkline, area);
}

fn render_progress_gauge(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let progress = dashboard.progress();
    let label = format!(
        "{}/{} ({:.1}%)",
        dashboard.episode,
        dashboard.total_episodes,
        progress * 100.0
    );

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Blue))
        .ratio(progress.clamp(0.0, 1.0))
        .label(label);

    frame.render_widget(gauge, area);
}

fn render_live_cartpole(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Live Episode (step {})", dashboard.live_step));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(ref state) = dashboard.live_state {
        cartpole_widget::render_cartpole(frame, state, dashboard.x_threshold, inner);
    } else {
        let placeholder = Paragraph::new("Waiting for first episode...")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(placeholder, inner);
    }
}

fn render_stats_panel(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::White));

    let mut lines = vec![
        Line::from(vec![
            label("Reward:      "),
            Span::styled(
                format!("{:.1}", dashboard.episode_reward),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Moving Avg:  "),
            Span::styled(
                format!("{:.2}", dashboard.average_reward),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            label("Best Avg:    "),
            Span::styled(
                format!("{:.2}", dashboard.best_average_reward),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            label("Loss:        "),
            Span::raw(format!("{:.6}", dashboard.loss)),
        ]),
        Line::from(vec![
            label("Learn Steps: "),
            Span::raw(format!("{}", dashboard.learn_steps)),
        ]),
    ];

    if dashboard.episodes_per_sec > 0.0 {
        lines.extend(vec![
            Line::from(vec![
                label("Ep/sec:      "),
                Span::raw(format!("{:.1}", dashboard.episodes_per_sec)),
            ]),
            Line::from(vec![
                label("Ep time:     "),
                Span::raw(format!("{:.1}ms", dashboard.avg_episode_ms)),
            ]),
            Line::from(vec![
                label("Upd time:    "),
                Span::raw(format!("{:.2}ms", dashboard.avg_update_ms)),
            ]),
        ]);
    }

    if let Some(eval) = dashboard.last_eval_reward {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            label("Greedy Eval: "),
            Span::styled(
                format!("{:.1}", eval),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    if let Some(ref ckpt) = dashboard.last_checkpoint {
        lines.push(Line::from(vec![
            label("Last Save: "),
            Span::styled(ckpt.clone(), Style::default().fg(Color::DarkGray)),
        ]));
    }

    let stats = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Stats"));

    frame.render_widget(stats, area);
}

fn render_footer(frame: &mut Frame, dashboard: &DashboardState, area: Rect) {
    let text = match (&dashboard.status, &dashboard.failure) {
        (TrainingStatus::Failed, Some(message)) => {
            Line::styled(
                format!("Training failed: {message}  |  Q: Quit"),
                Style::default().fg(Color::Red),
            )
        }
        (TrainingStatus::Finished | TrainingStatus::Failed, _) => {
            Line::raw("Training finished  |  Q: Quit")
        }
        _ => Line::raw("P: Pause/Resume  |  S: Save Checkpoint  |  Q: Quit"),
    };
    let footer = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Controls"));

    frame.render_widget(footer, area);
}

/// Compute x-axis bounds from data points.
fn x_bounds(data1: &[(f64, f64)], data2: &[(f64, f64)], total_episodes: usize) -> (f64, f64) {
    let first1 = data1.first().map(|d| d.0);
    let first2 = data2.first().map(|d| d.0);
    let x_min = match (first1, first2) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => 0.0,
    };

    let last1 = data1.last().map(|d| d.0);
    let last2 = data2.last().map(|d| d.0);
    let x_max = match (last1, last2) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => total_episodes.max(1) as f64,
    };

    (x_min, x_max.max(x_min + 1.0))
}
