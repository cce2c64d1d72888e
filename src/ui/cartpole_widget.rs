use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::env::CartPoleState;

const POLE_ROWS: usize = 5;
const CART: &str = "[===]";
const CART_HALF_WIDTH: usize = 2;

/// Text picture of the cart on its track, top row first:
/// pole rows, cart row, track row.
pub fn cartpole_lines(state: &CartPoleState, x_threshold: f64, width: usize) -> Vec<String> {
    let width = width.max(CART.len() + 2);
    let last = width - 1;

    let span = 2.0 * x_threshold.max(f64::EPSILON);
    let frac = ((state.x + x_threshold) / span).clamp(0.0, 1.0);
    let cart_col = ((frac * last as f64).round() as usize).clamp(CART_HALF_WIDTH, last - CART_HALF_WIDTH);

    let pole_char = if state.theta > 0.05 {
        '/'
    } else if state.theta < -0.05 {
        '\\'
    } else {
        '|'
    };

    let mut lines = Vec::with_capacity(POLE_ROWS + 2);
    for row in (1..=POLE_ROWS).rev() {
        let mut line = vec![' '; width];
        // Terminal cells are roughly twice as tall as they are wide.
        let offset = (row as f64 * 2.0 * state.theta.sin()).round() as i64;
        let col = cart_col as i64 + offset;
        if (0..width as i64).contains(&col) {
            line[col as usize] = pole_char;
        }
        lines.push(line.into_iter().collect());
    }

    let mut cart_line = vec![' '; width];
    for (i, ch) in CART.chars().enumerate() {
        cart_line[cart_col - CART_HALF_WIDTH + i] = ch;
    }
    lines.push(cart_line.into_iter().collect());

    let mut track = vec!['='; width];
    track[0] = '|';
    track[last] = '|';
    lines.push(track.into_iter().collect());

    lines
}

/// Render the cart, pole and a one-line readout of the state.
pub fn render_cartpole(frame: &mut Frame, state: &CartPoleState, x_threshold: f64, area: Rect) {
    let picture = cartpole_lines(state, x_threshold, area.width as usize);
    let pole_rows = picture.len() - 2;

    let mut lines: Vec<Line> = picture
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let color = if i < pole_rows {
                Color::Yellow
            } else if i == pole_rows {
                Color::Cyan
            } else {
                Color::DarkGray
            };
            Line::from(Span::styled(text, Style::default().fg(color)))
        })
        .collect();

    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "x: {:+.3}  v: {:+.3}",
        state.x, state.x_dot
    )));
    lines.push(Line::from(format!(
        "\u{03b8}: {:+.2}\u{00b0}  \u{03c9}: {:+.3}",
        state.theta.to_degrees(),
        state.theta_dot
    )));

    frame.render_widget(Paragraph::new(lines), area);
}
