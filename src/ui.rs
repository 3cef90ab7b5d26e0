//! Iced dashboard: update banner, exchange-rate label and the debug.log pane.
//!
//! Architecture overview
//! ─────────────────────
//! The app follows the Elm/MVU pattern enforced by Iced 0.13:
//!
//!   * `App`            — all UI state, plus the poller and tailer it owns.
//!   * `Message`        — every possible event (user action, timer tick,
//!                        async task result).
//!   * `App::update()`  — state + message → new state + `Task`.
//!   * `App::view()`    — state → `Element<Message>`.
//!   * `App::subscription()` — the UI tick.
//!
//! Threading model
//! ───────────────
//! `StatusPoller` and `LogTailer` run as tokio tasks on the runtime handed to
//! `App::new`.  They publish through `watch` channels; every `UiTick`
//! (250 ms) copies whatever changed into the view state.  Nothing in
//! `update()` waits on the network or the disk.
//!
//! Dropping `App` drops both components, which stops their timers.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use iced::{
    font::Font,
    time,
    widget::{button, column, container, row, scrollable, text, text_input, Space},
    Alignment, Color, Element, Length, Padding, Subscription, Task, Theme,
};
use iced::widget::scrollable::{Direction, Id as ScrollId, RelativeOffset, Scrollbar};
use tokio::{runtime::Handle, sync::watch};
use tracing::{info, warn};

use crate::{
    config::Config,
    poller::{PollResult, Severity, StatusPoller},
    remote::RemoteStatus,
    tailer::{ContentChange, LogSnapshot, LogTailer},
};

const UI_TICK: Duration = Duration::from_millis(250);

/// Lines kept in the rendered log pane; the tailer still holds the full text.
const MAX_LOG_LINES: usize = 5_000;

// ── Colour palette ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Palette {
    bg:       Color,
    bar:      Color,
    border:   Color,
    text:     Color,
    text_ter: Color,
    term_bg:  Color,
    term_fg:  Color,
}

const LIGHT: Palette = Palette {
    bg:       Color { r: 0.949, g: 0.949, b: 0.969, a: 1.0 }, // #f2f2f7
    bar:      Color { r: 1.0,   g: 1.0,   b: 1.0,   a: 1.0 }, // white
    border:   Color { r: 0.820, g: 0.820, b: 0.839, a: 1.0 }, // #d1d1d6
    text:     Color { r: 0.0,   g: 0.0,   b: 0.0,   a: 1.0 },
    text_ter: Color { r: 0.557, g: 0.557, b: 0.576, a: 1.0 }, // #8e8e93
    term_bg:  Color { r: 0.169, g: 0.165, b: 0.165, a: 1.0 }, // #2b2a2a
    term_fg:  Color { r: 0.216, g: 0.765, b: 0.996, a: 1.0 }, // #37c3fe
};

const DARK: Palette = Palette {
    bg:       Color { r: 0.118, g: 0.118, b: 0.118, a: 1.0 }, // #1e1e1e
    bar:      Color { r: 0.259, g: 0.259, b: 0.259, a: 1.0 }, // #424242
    border:   Color { r: 0.220, g: 0.220, b: 0.227, a: 1.0 }, // #38383a
    text:     Color { r: 0.949, g: 0.949, b: 0.969, a: 1.0 },
    text_ter: Color { r: 0.557, g: 0.557, b: 0.576, a: 1.0 },
    term_bg:  Color { r: 0.169, g: 0.165, b: 0.165, a: 1.0 },
    term_fg:  Color { r: 0.216, g: 0.765, b: 0.996, a: 1.0 },
};

const GREEN:    Color = Color { r: 0.204, g: 0.780, b: 0.349, a: 1.0 }; // #34c759
const OFF:      Color = Color { r: 0.820, g: 0.820, b: 0.839, a: 1.0 }; // #d1d1d6
const MAC_BLUE: Color = Color { r: 0.0,   g: 0.478, b: 1.0,   a: 1.0 }; // #007aff
const MAC_ORG:  Color = Color { r: 1.0,   g: 0.584, b: 0.0,   a: 1.0 }; // #ff9500
const HDD_ACC:  Color = Color { r: 0.239, g: 0.714, b: 0.918, a: 1.0 }; // #3db6ea

fn log_scroll_id() -> ScrollId { ScrollId::new("debug_log") }

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Message {
    /// 250 ms — copy fresh poller / tailer state into the view.
    UiTick,

    // ── Toolbar ──────────────────────────────────────────────────────────────
    BannerClicked,
    ExchangeRateClicked,
    CheckNow,
    ToggleTheme,

    // ── Log file selection ───────────────────────────────────────────────────
    LogPathChanged(String),
    BrowseLogFile,
    LogFileBrowsed(Option<String>),
    ApplyLogPath,
    UseDefaultLogPath,

    // ── Async results ────────────────────────────────────────────────────────
    ConfigSaved(Result<(), String>),

    DismissOverlay,
}

// ── App state ─────────────────────────────────────────────────────────────────

pub struct App {
    config:  Config,
    runtime: Handle,

    status_poller: StatusPoller<RemoteStatus>,
    status_rx:     watch::Receiver<PollResult>,
    status:        PollResult,

    log_tailer: LogTailer,
    log_rx:     watch::Receiver<LogSnapshot>,
    log:        LogSnapshot,
    log_lines:  Vec<String>,

    /// Editable path field (may differ from the tailed file until Apply).
    log_path_edit: String,

    /// Non-empty ⇒ display an overlay dialog with this message.
    overlay_message: Option<String>,
}

impl App {
    /// Build the dashboard and start both components on `runtime`.
    pub fn new(config: Config, runtime: Handle) -> Self {
        let _enter = runtime.enter();

        let mut status_poller = StatusPoller::new(
            RemoteStatus::new(&config),
            config.current_version(),
            config.version_ordering,
        );
        if let Err(e) = status_poller.start(config.status_interval()) {
            warn!("status poller not started: {e}");
        }

        let log_path = config.effective_log_path();
        let mut log_tailer = LogTailer::new(&log_path);
        if let Err(e) = log_tailer.start(config.log_interval()) {
            warn!("log tailer not started: {e}");
        }

        info!(
            version = %config.current_version(),
            log = %log_path.display(),
            config = %Config::config_file_path().display(),
            "dashboard started"
        );

        let status_rx = status_poller.subscribe();
        let status    = status_poller.snapshot();
        let log_rx    = log_tailer.subscribe();
        let log       = log_tailer.snapshot();
        let log_lines = last_lines(&log.contents, MAX_LOG_LINES);
        drop(_enter);

        Self {
            log_path_edit: log_path.to_string_lossy().into_owned(),
            config,
            runtime,
            status_poller,
            status_rx,
            status,
            log_tailer,
            log_rx,
            log,
            log_lines,
            overlay_message: None,
        }
    }

    // ── update ────────────────────────────────────────────────────────────────

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::UiTick => self.drain_updates(),

            Message::BannerClicked => {
                if self.status.banner().click_opens_releases() {
                    let url = self.config.release_page_url.clone();
                    self.open_external(&url);
                }
                Task::none()
            }

            Message::ExchangeRateClicked => {
                let url = self.config.price_page_url.clone();
                self.open_external(&url);
                Task::none()
            }

            Message::CheckNow => {
                let runtime = self.runtime.clone();
                let _enter = runtime.enter();
                if let Err(e) = self.status_poller.start(self.config.status_interval()) {
                    warn!("status poller restart failed: {e}");
                }
                Task::none()
            }

            Message::ToggleTheme => {
                self.config.dark_mode = !self.config.dark_mode;
                self.save_config()
            }

            Message::LogPathChanged(s) => {
                self.log_path_edit = s;
                Task::none()
            }

            Message::BrowseLogFile => {
                let start_dir = Path::new(self.log_path_edit.trim())
                    .parent()
                    .filter(|p| p.is_dir())
                    .map(Path::to_path_buf);
                Task::perform(
                    async move { browse_file("Select HDDcoin debug.log", start_dir).await },
                    Message::LogFileBrowsed,
                )
            }

            Message::LogFileBrowsed(p) => {
                if let Some(s) = p {
                    self.log_path_edit = s;
                }
                Task::none()
            }

            Message::ApplyLogPath => {
                let edit = self.log_path_edit.trim();
                if edit.is_empty() {
                    self.overlay_message = Some("The log file path must not be empty.".into());
                    return Task::none();
                }
                let path = PathBuf::from(edit);
                self.switch_log_file(path.clone());
                self.config.log_path = Some(path);
                self.save_config()
            }

            Message::UseDefaultLogPath => {
                self.config.log_path = None;
                let path = self.config.effective_log_path();
                self.log_path_edit = path.to_string_lossy().into_owned();
                self.switch_log_file(path);
                self.save_config()
            }

            Message::ConfigSaved(result) => {
                if let Err(e) = result {
                    warn!("config save failed: {e}");
                    self.overlay_message = Some(format!("Failed to save settings:\n{e}"));
                }
                Task::none()
            }

            Message::DismissOverlay => {
                self.overlay_message = None;
                Task::none()
            }
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Pull fresh state out of both watch channels.  Snaps the log pane to
    /// the bottom whenever the text grew or was replaced.
    fn drain_updates(&mut self) -> Task<Message> {
        if self.status_rx.has_changed().unwrap_or(false) {
            self.status = self.status_rx.borrow_and_update().clone();
        }

        if !self.log_rx.has_changed().unwrap_or(false) {
            return Task::none();
        }
        let next   = self.log_rx.borrow_and_update().clone();
        let change = next.change_from(&self.log);
        self.log_lines = last_lines(&next.contents, MAX_LOG_LINES);
        self.log       = next;

        match change {
            ContentChange::Unchanged => Task::none(),
            ContentChange::Appended | ContentChange::Replaced => {
                scrollable::snap_to(log_scroll_id(), RelativeOffset::END)
            }
        }
    }

    /// Replace the tailer with one on `path`.  The old one stops on drop.
    fn switch_log_file(&mut self, path: PathBuf) {
        if path == self.log_tailer.path() && self.log_tailer.is_running() {
            return;
        }
        let runtime = self.runtime.clone();
        let _enter = runtime.enter();

        let mut tailer = LogTailer::new(&path);
        if let Err(e) = tailer.start(self.config.log_interval()) {
            warn!("log tailer not started: {e}");
        }
        info!(log = %path.display(), "switched log file");

        self.log_rx     = tailer.subscribe();
        self.log        = tailer.snapshot();
        self.log_lines  = last_lines(&self.log.contents, MAX_LOG_LINES);
        self.log_tailer = tailer;
    }

    fn open_external(&mut self, url: &str) {
        if let Err(e) = open::that_detached(url) {
            warn!("could not open {url}: {e}");
            self.overlay_message = Some(format!("Could not open {url}:\n{e}"));
        }
    }

    fn save_config(&self) -> Task<Message> {
        let config = self.config.clone();
        Task::perform(
            async move { config.save().map_err(|e| format!("{e:#}")) },
            Message::ConfigSaved,
        )
    }

    fn palette(&self) -> Palette {
        if self.config.dark_mode { DARK } else { LIGHT }
    }

    // ── subscription / theme ─────────────────────────────────────────────────

    pub fn subscription(&self) -> Subscription<Message> {
        time::every(UI_TICK).map(|_| Message::UiTick)
    }

    pub fn theme(&self) -> Theme {
        if self.config.dark_mode { Theme::Dark } else { Theme::Light }
    }

    // ── view ──────────────────────────────────────────────────────────────────

    pub fn view(&self) -> Element<'_, Message> {
        let pal = self.palette();

        if let Some(msg) = &self.overlay_message {
            return view_overlay(msg, pal);
        }

        let content = column![
            self.view_toolbar(pal),
            horizontal_rule(pal),
            self.view_log_path_row(pal),
            horizontal_rule(pal),
            self.view_log_pane(pal),
            horizontal_rule(pal),
            self.view_status_bar(pal),
        ]
        .width(Length::Fill)
        .height(Length::Fill);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(move |_| container::Style {
                background: Some(pal.bg.into()),
                ..Default::default()
            })
            .into()
    }

    // ── Toolbar ───────────────────────────────────────────────────────────────

    fn view_toolbar(&self, pal: Palette) -> Element<'_, Message> {
        let title = text("HDDcoin")
            .size(18)
            .font(Font { weight: iced::font::Weight::Bold, ..Font::default() })
            .color(pal.text);

        let rate = button(text(self.status.rate_label()).size(14).color(pal.text))
            .padding(Padding::from([4, 18]))
            .style(move |_, status| button::Style {
                background: Some(match status {
                    button::Status::Hovered | button::Status::Pressed => pal.bg.into(),
                    _ => pal.bar.into(),
                }),
                text_color: pal.text,
                border: iced::Border { color: HDD_ACC, width: 1.0, radius: 5.0.into() },
                shadow: iced::Shadow::default(),
            })
            .on_press(Message::ExchangeRateClicked);

        let mut bar = row![title, Space::with_width(Length::Fill), rate, Space::with_width(12)]
            .align_y(Alignment::Center);

        let banner = self.status.banner();
        if banner.visible {
            let style = match banner.severity {
                Severity::Warning => ButtonStyle::Warning,
                Severity::Info    => ButtonStyle::Primary,
            };
            bar = bar.push(styled_button(banner.message, style).on_press(Message::BannerClicked));
            bar = bar.push(Space::with_width(12));
        }

        let theme_label = if self.config.dark_mode { "Light" } else { "Dark" };
        bar = bar
            .push(
                styled_button("Check now", ButtonStyle::Secondary)
                    .on_press_maybe(self.status_poller.is_running().then_some(Message::CheckNow)),
            )
            .push(Space::with_width(8))
            .push(styled_button(theme_label, ButtonStyle::Secondary).on_press(Message::ToggleTheme));

        container(bar.padding(Padding::from([0, 16])))
            .width(Length::Fill)
            .height(56)
            .align_y(Alignment::Center)
            .style(move |_| container::Style {
                background: Some(pal.bar.into()),
                ..Default::default()
            })
            .into()
    }

    // ── Log path row ──────────────────────────────────────────────────────────

    fn view_log_path_row(&self, pal: Palette) -> Element<'_, Message> {
        let exists = Path::new(self.log_path_edit.trim()).is_file();
        let exists_dot = text("●").size(13).color(if exists { GREEN } else { OFF });

        let path_row = row![
            text("Log File").size(11).color(pal.text_ter).width(80),
            text_input("", &self.log_path_edit)
                .on_input(Message::LogPathChanged)
                .on_submit(Message::ApplyLogPath)
                .padding(Padding::from([4, 6]))
                .font(Font::MONOSPACE)
                .size(11),
            Space::with_width(6),
            exists_dot,
            Space::with_width(6),
            styled_button("Browse…", ButtonStyle::Secondary).on_press(Message::BrowseLogFile),
            styled_button("Default", ButtonStyle::Secondary).on_press(Message::UseDefaultLogPath),
            styled_button("Apply", ButtonStyle::Confirm).on_press(Message::ApplyLogPath),
        ]
        .align_y(Alignment::Center)
        .spacing(4)
        .padding(Padding::from([8, 16]));

        container(path_row)
            .width(Length::Fill)
            .style(move |_| container::Style {
                background: Some(pal.bar.into()),
                ..Default::default()
            })
            .into()
    }

    // ── Log pane ──────────────────────────────────────────────────────────────

    fn view_log_pane(&self, pal: Palette) -> Element<'_, Message> {
        let lines: Vec<Element<Message>> = self
            .log_lines
            .iter()
            .map(|l| {
                text(l.as_str())
                    .size(12)
                    .font(Font::MONOSPACE)
                    .color(pal.term_fg)
                    .into()
            })
            .collect();

        let content = column(lines)
            .spacing(0)
            .width(Length::Fill)
            .padding(Padding::from([6, 10]));

        let pane = scrollable(content)
            .id(log_scroll_id())
            .direction(Direction::Vertical(Scrollbar::default()))
            .height(Length::Fill)
            .width(Length::Fill);

        container(pane)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(move |_| container::Style {
                background: Some(pal.term_bg.into()),
                border: iced::Border { color: HDD_ACC, width: 2.0, radius: 0.0.into() },
                ..Default::default()
            })
            .into()
    }

    // ── Status bar ────────────────────────────────────────────────────────────

    fn view_status_bar(&self, pal: Palette) -> Element<'_, Message> {
        let latest = self.status.latest_version.as_deref().unwrap_or("unknown");
        let summary = format!(
            "Client {}  ·  Latest release {}  ·  {} lines",
            self.status.current_version,
            latest,
            self.log_lines.len(),
        );

        let bar = row![
            text(summary).size(10).color(pal.text_ter),
            Space::with_width(Length::Fill),
            text(self.log.path.display().to_string()).size(10).color(pal.text_ter),
        ]
        .align_y(Alignment::Center)
        .padding(Padding::from([6, 16]));

        container(bar)
            .width(Length::Fill)
            .style(move |_| container::Style {
                background: Some(pal.bar.into()),
                ..Default::default()
            })
            .into()
    }
}

// ── Overlay (modal dialog) ────────────────────────────────────────────────────

fn view_overlay(message: &str, pal: Palette) -> Element<'_, Message> {
    let dialog = container(
        column![
            text(message).size(14).color(pal.text),
            Space::with_height(16),
            styled_button("OK", ButtonStyle::Primary).on_press(Message::DismissOverlay),
        ]
        .spacing(0)
        .padding(24)
        .width(440),
    )
    .style(move |_| container::Style {
        background: Some(pal.bar.into()),
        border: iced::Border { color: pal.border, width: 1.0, radius: 12.0.into() },
        shadow: iced::Shadow {
            color: Color { r: 0.0, g: 0.0, b: 0.0, a: 0.25 },
            offset: iced::Vector { x: 0.0, y: 4.0 },
            blur_radius: 20.0,
        },
        ..Default::default()
    });

    container(dialog)
        .width(Length::Fill)
        .height(Length::Fill)
        .align_x(Alignment::Center)
        .align_y(Alignment::Center)
        .style(|_| container::Style {
            background: Some(Color { r: 0.0, g: 0.0, b: 0.0, a: 0.4 }.into()),
            ..Default::default()
        })
        .into()
}

// ── Widget helpers ────────────────────────────────────────────────────────────

fn horizontal_rule<'a>(pal: Palette) -> Element<'a, Message> {
    container(Space::with_height(1))
        .width(Length::Fill)
        .style(move |_| container::Style {
            background: Some(pal.border.into()),
            ..Default::default()
        })
        .into()
}

// ── Button styling ────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum ButtonStyle {
    Primary,
    Secondary,
    Warning,
    Confirm,
}

fn styled_button(label: &str, style: ButtonStyle) -> button::Button<'_, Message> {
    let (bg, hover_bg, fg) = match style {
        ButtonStyle::Primary   => (MAC_BLUE, darken(MAC_BLUE), Color::WHITE),
        ButtonStyle::Secondary => (Color{r:0.898,g:0.898,b:0.918,a:1.0}, Color{r:0.847,g:0.847,b:0.871,a:1.0}, Color::BLACK),
        ButtonStyle::Warning   => (MAC_ORG,  darken(MAC_ORG),  Color::WHITE),
        ButtonStyle::Confirm   => (GREEN,    darken(GREEN),    Color::WHITE),
    };

    button(text(label).size(11).color(fg))
        .padding(Padding::from([5, 14]))
        .style(move |_, status| button::Style {
            background: Some(match status {
                button::Status::Hovered | button::Status::Pressed => hover_bg.into(),
                _ => bg.into(),
            }),
            text_color: fg,
            border: iced::Border { color: Color::TRANSPARENT, width: 0.0, radius: 6.0.into() },
            shadow: iced::Shadow::default(),
        })
}

fn darken(c: Color) -> Color {
    Color {
        r: (c.r * 0.85).min(1.0),
        g: (c.g * 0.85).min(1.0),
        b: (c.b * 0.85).min(1.0),
        a: c.a,
    }
}

/// The last `max` lines of `contents`.
fn last_lines(contents: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = contents.lines().collect();
    let skip = lines.len().saturating_sub(max);
    lines[skip..].iter().map(|l| (*l).to_owned()).collect()
}

// ── Async helpers ─────────────────────────────────────────────────────────────

async fn browse_file(title: &str, start_dir: Option<PathBuf>) -> Option<String> {
    let mut dialog = rfd::AsyncFileDialog::new()
        .set_title(title)
        .add_filter("Log files", &["log", "txt"]);
    if let Some(dir) = start_dir {
        dialog = dialog.set_directory(dir);
    }
    dialog
        .pick_file()
        .await
        .map(|f| f.path().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_lines_keeps_the_tail() {
        assert_eq!(last_lines("a\nb\nc\n", 2), vec!["b", "c"]);
        assert_eq!(last_lines("a\nb", 5), vec!["a", "b"]);
        assert!(last_lines("", 5).is_empty());
    }

    #[test]
    fn darken_keeps_alpha() {
        let c = darken(MAC_ORG);
        assert!(c.r < MAC_ORG.r);
        assert_eq!(c.a, MAC_ORG.a);
    }
}
