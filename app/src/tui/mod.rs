//! Terminal UI for recording a callout.
//!
//! Layout:
//! - Centered window titled "Callout Wizard"
//! - Left banner panel with logo and the step list (cursor and completion marks)
//! - Content panel for the current step
//! - Bottom button row: [ Back ] [ Next ] [ Cancel ]
//! - Modal confirmations (Cancel) and messages (validation failures, save result)
//! - Saved-callout browser (F10), filtered by the current selections
//!
//! Button enablement follows the controller's events; the UI never decides on its own whether a
//! step may be left.
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::models::callout::{CalloutForm, CalloutRecord, ImageAttachment, ImageKind};
use crate::models::catalog::{AbilityRecord, Catalog};
use crate::models::selection::{
    self, Selection, Side, ABILITY_KEY, DETAILS_KEY, HERO_KEY, MAP_KEY, SIDE_KEY,
};
use crate::storage::{CalloutQuery, CalloutStore};
use crate::utils::layout::{centered_rect, grid_columns, grid_move, grid_position, GridMove};
use crate::wizard::{SelectionRegistry, WizardController, WizardError, WizardEvent};

const ASCII_LOGO: &str = "╔═╗╔═╗╦  ╦  ╔═╗╦ ╦╔╦╗
║  ╠═╣║  ║  ║ ║║ ║ ║
╚═╝╩ ╩╩═╝╩═╝╚═╝╚═╝ ╩";

const WINDOW_WIDTH: u16 = 100;
const WINDOW_HEIGHT: u16 = 30;
const BANNER_WIDTH: u16 = 34;
const GRID_MARGIN: u16 = 1;
const BROWSE_KEY: u8 = 10;

const FORM_FIELDS: [&str; 7] = [
    "Position *",
    "Position detail",
    "Aim point",
    "Aim point detail",
    "Drop point",
    "Drop point detail",
    "Notes",
];
const NOTES_FIELD: usize = 6;
const NOTES_VISIBLE_LINES: usize = 4;
const IMAGE_FIELD: usize = FORM_FIELDS.len();
const DETAILS_FIELD_COUNT: usize = FORM_FIELDS.len() + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Map,
    Hero,
    Side,
    Ability,
    Details,
}

impl Page {
    fn from_step_id(id: &str) -> Option<Self> {
        match id {
            "map" => Some(Page::Map),
            "hero" => Some(Page::Hero),
            "side" => Some(Page::Side),
            "ability" => Some(Page::Ability),
            "details" => Some(Page::Details),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    Back,
    Next,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modal {
    ConfirmCancel,
    Message {
        title: String,
        body: String,
        quit_on_close: bool,
    },
}

/// Text field. `cursor` counts characters, not bytes. Only the notes field holds newlines.
#[derive(Debug, Clone, Default)]
struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn newline(&mut self) {
        self.handle_key(KeyCode::Char('\n'));
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        let len = self.value.chars().count();
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index();
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < len {
                    let at = self.byte_index();
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(len);
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = len;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    /// The step's picker (map grid, hero list, side toggle, ability list).
    Content,
    Field(usize),
    Button(ButtonFocus),
}

/// Saved callouts shown over the wizard.
struct Browser {
    /// Ignore the current selections and list everything.
    all: bool,
    records: Vec<CalloutRecord>,
    index: usize,
    error: Option<String>,
}

struct WizardState {
    wizard: WizardController<Selection>,
    events: mpsc::Receiver<WizardEvent<Selection>>,
    catalog: Catalog,
    store: CalloutStore,
    modal: Option<Modal>,
    focus: FocusTarget,
    quit: bool,
    status: Option<String>,

    // Mirrors of controller state, updated from events only.
    back_enabled: bool,
    next_enabled: bool,

    // Layout
    screen_width: u16,
    card_width: u16,
    card_spacing: u16,

    // Page state
    map_index: usize,
    hero_index: usize,
    side_choice: Side,
    ability_index: usize,
    inputs: [TextInput; DETAILS_FIELD_COUNT],
    image_kind: ImageKind,
    images: Vec<ImageAttachment>,

    browser: Option<Browser>,
    saved_path: Option<PathBuf>,
}

impl WizardState {
    fn new(catalog: Catalog, store: CalloutStore, config: &AppConfig) -> Result<Self> {
        let mut wizard = selection::new_callout_wizard(config.retreat_policy())?;
        let events = wizard.channel();
        let next_enabled = wizard.is_current_step_complete();

        Ok(Self {
            wizard,
            events,
            catalog,
            store,
            modal: None,
            focus: FocusTarget::Content,
            quit: false,
            status: None,
            back_enabled: false,
            next_enabled,
            screen_width: WINDOW_WIDTH,
            card_width: config.card_width.max(1),
            card_spacing: config.card_spacing,
            map_index: 0,
            hero_index: 0,
            side_choice: Side::Attack,
            ability_index: 0,
            inputs: Default::default(),
            image_kind: ImageKind::Position,
            images: Vec::new(),
            browser: None,
            saved_path: None,
        })
    }
}

fn current_page(state: &WizardState) -> Page {
    Page::from_step_id(state.wizard.current_step_id().as_str()).unwrap_or(Page::Details)
}

fn page_title(page: Page) -> &'static str {
    match page {
        Page::Map => "Select a map",
        Page::Hero => "Select a hero",
        Page::Side => "Select a side",
        Page::Ability => "Select an ability",
        Page::Details => "Callout details",
    }
}

fn step_label(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn next_label(state: &WizardState) -> &'static str {
    if state.wizard.is_last_step() {
        "Save"
    } else {
        "Next"
    }
}

fn page_field_count(page: Page) -> usize {
    match page {
        Page::Details => DETAILS_FIELD_COUNT,
        _ => 0,
    }
}

/// Width of the content panel's interior for a terminal `screen_width` cells wide.
fn content_width_for(screen_width: u16) -> u16 {
    screen_width
        .min(WINDOW_WIDTH)
        .saturating_sub(2 + BANNER_WIDTH + 2)
}

fn map_columns(state: &WizardState, width: u16) -> usize {
    grid_columns(width, state.card_width, state.card_spacing, GRID_MARGIN)
}

fn current_abilities(state: &WizardState) -> Vec<AbilityRecord> {
    state
        .wizard
        .selection(HERO_KEY)
        .and_then(Selection::as_hero)
        .map(|h| h.abilities_or_default())
        .unwrap_or_default()
}

pub fn run(config: &AppConfig) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting callout wizard");

    let mut state = new_wizard_state(config)?;
    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &mut state);
    restore_terminal(&mut terminal)?;

    if let Some(path) = &state.saved_path {
        info!("[PHASE: tui] [STEP: exit] Callout saved to {:?}", path);
    }
    result
}

fn new_wizard_state(config: &AppConfig) -> Result<WizardState> {
    let (catalog, catalog_error) = Catalog::load_or_builtin(&config.catalog_dir);
    let mut state = WizardState::new(catalog, CalloutStore::new(config.data_dir.clone()), config)?;

    if let Some(e) = catalog_error {
        state.modal = Some(Modal::Message {
            title: "Catalog error".to_string(),
            body: format!("{:#}\n\nThe built-in catalog is used instead.", e),
            quit_on_close: false,
        });
    }
    Ok(state)
}

fn new_smoke_wizard_state(config: &AppConfig, target: &str) -> Result<WizardState> {
    // Smoke-only: seeded state for deterministic page rendering.
    let mut state = WizardState::new(
        Catalog::builtin(),
        CalloutStore::new(config.data_dir.clone()),
        config,
    )?;

    let page = match target {
        "hero" => 1,
        "side" => 2,
        "ability" => 3,
        "details" | "invalid" => 4,
        _ => 0,
    };
    seed_selections(&mut state, page);
    if page > 0 {
        let _ = state.wizard.jump_to(page);
    }
    drain_events(&mut state);

    match target {
        "details" => {
            state.inputs[0].set("A main, behind the left box");
            state.inputs[2].set("Top of the antenna");
            sync_form(&mut state);
        }
        "invalid" => {
            set_focused_button(&mut state, ButtonFocus::Next);
            go_next(&mut state);
        }
        "cancel" => {
            state.modal = Some(Modal::ConfirmCancel);
            set_focused_button(&mut state, ButtonFocus::Next);
        }
        "browse" => open_browser(&mut state),
        _ => {}
    }
    Ok(state)
}

/// Fill the first `upto` steps with the first catalog entries.
fn seed_selections(state: &mut WizardState, upto: usize) {
    let map = state.catalog.maps.first().cloned();
    let hero = state.catalog.heroes.first().cloned();
    let ability = hero
        .as_ref()
        .and_then(|h| h.abilities_or_default().into_iter().next());

    if let Some(m) = map.filter(|_| upto > 0) {
        state.wizard.set_selection(MAP_KEY, Selection::Map(m));
    }
    if let Some(h) = hero.filter(|_| upto > 1) {
        state.wizard.set_selection(HERO_KEY, Selection::Hero(h));
    }
    if upto > 2 {
        state.wizard.set_selection(SIDE_KEY, Selection::Side(Side::Attack));
    }
    if let Some(a) = ability.filter(|_| upto > 3) {
        state.wizard.set_selection(ABILITY_KEY, Selection::Ability(a));
    }
}

/// Non-interactive smoke mode: render a single frame and exit.
/// Targets: map|hero|side|ability|details|invalid|cancel|browse
pub fn smoke(config: &AppConfig, target: &str) -> Result<()> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let t = target.trim().to_ascii_lowercase();
    let state = new_smoke_wizard_state(config, t.as_str())?;

    // In-memory backend: no raw mode, no alternate screen.
    let backend = TestBackend::new(WINDOW_WIDTH, WINDOW_HEIGHT);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &state))?;

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut WizardState,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    while !state.quit {
        drain_events(state);
        state.screen_width = terminal.size()?.width;
        terminal.draw(|f| draw(f.size(), f, &*state))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(state, key.code),
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn focused_button(state: &WizardState) -> ButtonFocus {
    match state.focus {
        FocusTarget::Button(b) => b,
        _ => ButtonFocus::Next,
    }
}

fn set_focused_button(state: &mut WizardState, b: ButtonFocus) {
    state.focus = FocusTarget::Button(b);
}

/// Apply every pending controller event to the view state.
fn drain_events(state: &mut WizardState) {
    while let Ok(ev) = state.events.try_recv() {
        match ev {
            WizardEvent::StepEntered { index, id } => {
                state.back_enabled = index > 0;
                state.status = None;
                sync_page_from_selections(state);
                state.focus = if page_field_count(current_page(state)) > 0 {
                    FocusTarget::Field(0)
                } else {
                    FocusTarget::Content
                };
                info!("[PHASE: tui] [STEP: navigate] Showing step '{}'", id);
            }
            WizardEvent::StepExited { .. } => {}
            WizardEvent::StepValidityChanged(valid) => state.next_enabled = valid,
            WizardEvent::ValidationFailed { step, reason } => {
                state.modal = Some(Modal::Message {
                    title: "Cannot continue".to_string(),
                    body: format!(
                        "Step '{}' is not finished: {}.",
                        step_label(step.as_str()),
                        reason
                    ),
                    quit_on_close: false,
                });
            }
            WizardEvent::BoundaryReached => {
                state.status = Some("Already at the first step.".to_string());
            }
            WizardEvent::Completed(registry) => save_callout(state, &registry),
        }
    }
}

fn save_callout(state: &mut WizardState, registry: &SelectionRegistry<Selection>) {
    let saved = CalloutRecord::from_selections(registry).and_then(|record| {
        let path = state.store.save(&record)?;
        Ok((record, path))
    });

    match saved {
        Ok((record, path)) => {
            info!(
                "[PHASE: tui] [STEP: save] Saved callout {}: {}",
                record.id,
                record.summary()
            );
            state.modal = Some(Modal::Message {
                title: "Callout saved".to_string(),
                body: format!("{}\n\nSaved to {}", record.summary(), path.display()),
                quit_on_close: true,
            });
            state.saved_path = Some(path);
        }
        Err(e) => {
            warn!("[PHASE: tui] [STEP: save] Failed to save callout: {:#}", e);
            state.modal = Some(Modal::Message {
                title: "Save failed".to_string(),
                body: format!("{:#}", e),
                quit_on_close: false,
            });
        }
    }
}

/// Point the page's cursor at whatever is already selected for it.
fn sync_page_from_selections(state: &mut WizardState) {
    match current_page(state) {
        Page::Map => {
            let selected = state
                .wizard
                .selection(MAP_KEY)
                .and_then(Selection::as_map)
                .map(|m| m.id.clone());
            if let Some(i) =
                selected.and_then(|id| state.catalog.maps.iter().position(|m| m.id == id))
            {
                state.map_index = i;
            }
        }
        Page::Hero => {
            let selected = state
                .wizard
                .selection(HERO_KEY)
                .and_then(Selection::as_hero)
                .map(|h| h.id.clone());
            if let Some(i) =
                selected.and_then(|id| state.catalog.heroes.iter().position(|h| h.id == id))
            {
                state.hero_index = i;
            }
        }
        Page::Side => {
            if let Some(side) = state.wizard.selection(SIDE_KEY).and_then(Selection::as_side) {
                state.side_choice = side;
            }
        }
        Page::Ability => {
            let selected = state
                .wizard
                .selection(ABILITY_KEY)
                .and_then(Selection::as_ability)
                .map(|a| a.id.clone());
            state.ability_index = selected
                .and_then(|id| current_abilities(state).iter().position(|a| a.id == id))
                .unwrap_or(0);
        }
        Page::Details => load_form_inputs(state),
    }
}

fn load_form_inputs(state: &mut WizardState) {
    let form = state
        .wizard
        .selection(DETAILS_KEY)
        .and_then(Selection::as_details)
        .cloned()
        .unwrap_or_default();

    let values = [
        form.position,
        form.position_detail,
        form.aim_point,
        form.aim_point_detail,
        form.drop_point,
        form.drop_point_detail,
        form.notes,
    ];
    for (input, value) in state.inputs.iter_mut().zip(values) {
        input.set(value);
    }
    state.inputs[IMAGE_FIELD].set("");
    state.images = form.images;
}

fn form_from_inputs(state: &WizardState) -> CalloutForm {
    let value = |i: usize| state.inputs[i].value.clone();
    CalloutForm {
        position: value(0),
        position_detail: value(1),
        aim_point: value(2),
        aim_point_detail: value(3),
        drop_point: value(4),
        drop_point_detail: value(5),
        notes: value(6),
        images: state.images.clone(),
    }
}

fn sync_form(state: &mut WizardState) {
    let form = form_from_inputs(state);
    state.wizard.set_selection(DETAILS_KEY, Selection::Details(form));
    drain_events(state);
}

fn attach_image(state: &mut WizardState) {
    let raw = state.inputs[IMAGE_FIELD].value.trim().to_string();
    if raw.is_empty() {
        return;
    }

    let mut form = form_from_inputs(state);
    match form.attach_image(state.image_kind, raw) {
        Ok(()) => {
            state.images = form.images;
            state.inputs[IMAGE_FIELD].set("");
            state.status = None;
            sync_form(state);
        }
        Err(e) => state.status = Some(e.to_string()),
    }
}

/// Store the highlighted item of the current page. Returns false when there is nothing to pick.
fn select_highlighted(state: &mut WizardState) -> bool {
    let picked = match current_page(state) {
        Page::Map => state
            .catalog
            .maps
            .get(state.map_index)
            .cloned()
            .map(|m| (MAP_KEY, Selection::Map(m))),
        Page::Hero => state
            .catalog
            .heroes
            .get(state.hero_index)
            .cloned()
            .map(|h| (HERO_KEY, Selection::Hero(h))),
        Page::Side => Some((SIDE_KEY, Selection::Side(state.side_choice))),
        Page::Ability => current_abilities(state)
            .get(state.ability_index)
            .cloned()
            .map(|a| (ABILITY_KEY, Selection::Ability(a))),
        Page::Details => None,
    };

    match picked {
        Some((key, value)) => {
            state.wizard.set_selection(key, value);
            drain_events(state);
            true
        }
        None => false,
    }
}

// Rejections are reported through controller events.
fn go_next(state: &mut WizardState) {
    let _ = state.wizard.advance();
    drain_events(state);
}

fn go_back(state: &mut WizardState) {
    let _ = state.wizard.retreat();
    drain_events(state);
}

fn jump(state: &mut WizardState, index: usize) {
    if let Err(e @ WizardError::Range { .. }) = state.wizard.jump_to(index) {
        state.status = Some(format!("No such step: {}", e));
    }
    drain_events(state);
}

/// Query built from whatever map, hero and side are selected so far.
fn browse_query(state: &WizardState) -> CalloutQuery {
    let selected = |key: &str| state.wizard.selection(key);
    CalloutQuery {
        map: selected(MAP_KEY)
            .and_then(Selection::as_map)
            .map(|m| m.id.clone()),
        hero: selected(HERO_KEY)
            .and_then(Selection::as_hero)
            .map(|h| h.id.clone()),
        side: selected(SIDE_KEY).and_then(Selection::as_side),
    }
}

fn open_browser(state: &mut WizardState) {
    state.browser = Some(Browser {
        all: false,
        records: Vec::new(),
        index: 0,
        error: None,
    });
    refresh_browser(state);
}

fn refresh_browser(state: &mut WizardState) {
    let query = browse_query(state);
    let Some(browser) = state.browser.as_mut() else {
        return;
    };
    let query = if browser.all {
        CalloutQuery::default()
    } else {
        query
    };

    match state.store.query(&query) {
        Ok(records) => {
            info!(
                "[PHASE: tui] [STEP: browse] {} saved callout(s) match {:?}",
                records.len(),
                query
            );
            browser.index = browser.index.min(records.len().saturating_sub(1));
            browser.records = records;
            browser.error = None;
        }
        Err(e) => {
            warn!("[PHASE: tui] [STEP: browse] Listing failed: {:#}", e);
            browser.records.clear();
            browser.index = 0;
            browser.error = Some(format!("{:#}", e));
        }
    }
}

fn handle_browse_key(state: &mut WizardState, code: KeyCode) {
    let Some(browser) = state.browser.as_mut() else {
        return;
    };
    match code {
        KeyCode::Esc | KeyCode::F(BROWSE_KEY) => state.browser = None,
        KeyCode::Tab => {
            browser.all = !browser.all;
            browser.index = 0;
            refresh_browser(state);
        }
        KeyCode::Delete => {
            let Some(id) = browser.records.get(browser.index).map(|r| r.id) else {
                return;
            };
            match state.store.delete(id) {
                Ok(_) => refresh_browser(state),
                Err(e) => {
                    warn!("[PHASE: tui] [STEP: browse] Delete failed: {:#}", e);
                    browser.error = Some(format!("{:#}", e));
                }
            }
        }
        _ => browser.index = step_list(browser.index, browser.records.len(), code),
    }
}

fn arrow(code: KeyCode) -> Option<GridMove> {
    match code {
        KeyCode::Left => Some(GridMove::Left),
        KeyCode::Right => Some(GridMove::Right),
        KeyCode::Up => Some(GridMove::Up),
        KeyCode::Down => Some(GridMove::Down),
        _ => None,
    }
}

fn step_list(index: usize, len: usize, code: KeyCode) -> usize {
    match code {
        KeyCode::Up => index.saturating_sub(1),
        KeyCode::Down => (index + 1).min(len.saturating_sub(1)),
        KeyCode::Home => 0,
        KeyCode::End => len.saturating_sub(1),
        _ => index,
    }
}

fn cycle_focus(state: &mut WizardState) {
    let fields = page_field_count(current_page(state));
    state.focus = match state.focus {
        FocusTarget::Content => FocusTarget::Button(ButtonFocus::Back),
        FocusTarget::Field(i) if i + 1 < fields => FocusTarget::Field(i + 1),
        FocusTarget::Field(_) => FocusTarget::Button(ButtonFocus::Back),
        FocusTarget::Button(ButtonFocus::Back) => FocusTarget::Button(ButtonFocus::Next),
        FocusTarget::Button(ButtonFocus::Next) => FocusTarget::Button(ButtonFocus::Cancel),
        FocusTarget::Button(ButtonFocus::Cancel) => {
            if fields > 0 {
                FocusTarget::Field(0)
            } else {
                FocusTarget::Content
            }
        }
    };
}

fn handle_key(state: &mut WizardState, code: KeyCode) {
    // Modal handling
    if let Some(modal) = state.modal.clone() {
        match modal {
            Modal::ConfirmCancel => match code {
                KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                    let next = match focused_button(state) {
                        ButtonFocus::Cancel => ButtonFocus::Next,
                        _ => ButtonFocus::Cancel,
                    };
                    set_focused_button(state, next);
                }
                KeyCode::Enter => {
                    let confirm = focused_button(state) == ButtonFocus::Cancel;
                    state.modal = None;
                    if confirm {
                        info!("[PHASE: tui] [STEP: cancel] Callout discarded by user");
                        state.quit = true;
                    }
                }
                KeyCode::Esc => {
                    state.modal = None;
                }
                _ => {}
            },
            Modal::Message { quit_on_close, .. } => {
                if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                    state.modal = None;
                    if quit_on_close {
                        state.quit = true;
                    }
                }
            }
        }
        return;
    }

    if state.browser.is_some() {
        handle_browse_key(state, code);
        return;
    }

    // Global keys
    match code {
        KeyCode::F(BROWSE_KEY) => {
            open_browser(state);
            return;
        }
        KeyCode::Esc => {
            state.modal = Some(Modal::ConfirmCancel);
            set_focused_button(state, ButtonFocus::Next); // "No"
            return;
        }
        KeyCode::F(n) if n >= 1 => {
            jump(state, n as usize - 1);
            return;
        }
        _ => {}
    }

    let page = current_page(state);

    // Text input handling (details form)
    if let FocusTarget::Field(i) = state.focus {
        if i == IMAGE_FIELD {
            match code {
                KeyCode::Enter => {
                    attach_image(state);
                    return;
                }
                KeyCode::Up | KeyCode::Down => {
                    state.image_kind = state.image_kind.next();
                    return;
                }
                KeyCode::Delete if state.inputs[IMAGE_FIELD].value.is_empty() => {
                    if state.images.pop().is_some() {
                        sync_form(state);
                    }
                    return;
                }
                _ => {}
            }
        } else if i == NOTES_FIELD && code == KeyCode::Enter {
            state.inputs[NOTES_FIELD].newline();
            sync_form(state);
            return;
        } else if code == KeyCode::Enter {
            cycle_focus(state);
            return;
        }

        if let Some(input) = state.inputs.get_mut(i) {
            if input.handle_key(code) {
                if i < IMAGE_FIELD {
                    sync_form(state);
                }
                return;
            }
        }
    }

    if code == KeyCode::Tab {
        cycle_focus(state);
        return;
    }

    match state.focus {
        FocusTarget::Content => match code {
            KeyCode::Char(' ') => {
                select_highlighted(state);
            }
            KeyCode::Enter => {
                if select_highlighted(state) {
                    go_next(state);
                }
            }
            _ => match page {
                Page::Map => {
                    if let Some(dir) = arrow(code) {
                        let cols = map_columns(state, content_width_for(state.screen_width));
                        state.map_index =
                            grid_move(state.map_index, state.catalog.maps.len(), cols, dir);
                    }
                }
                Page::Hero => {
                    state.hero_index = step_list(state.hero_index, state.catalog.heroes.len(), code);
                }
                Page::Side => {
                    if arrow(code).is_some() {
                        state.side_choice = state.side_choice.toggle();
                    }
                }
                Page::Ability => {
                    let len = current_abilities(state).len();
                    state.ability_index = step_list(state.ability_index, len, code);
                }
                Page::Details => {}
            },
        },
        FocusTarget::Button(b) => match code {
            KeyCode::Left => {
                let prev = match b {
                    ButtonFocus::Back => ButtonFocus::Cancel,
                    ButtonFocus::Next => ButtonFocus::Back,
                    ButtonFocus::Cancel => ButtonFocus::Next,
                };
                set_focused_button(state, prev);
            }
            KeyCode::Right => {
                let next = match b {
                    ButtonFocus::Back => ButtonFocus::Next,
                    ButtonFocus::Next => ButtonFocus::Cancel,
                    ButtonFocus::Cancel => ButtonFocus::Back,
                };
                set_focused_button(state, next);
            }
            // Disabled buttons still reach the controller so the user learns why.
            KeyCode::Enter => match b {
                ButtonFocus::Back => go_back(state),
                ButtonFocus::Next => go_next(state),
                ButtonFocus::Cancel => {
                    state.modal = Some(Modal::ConfirmCancel);
                    set_focused_button(state, ButtonFocus::Next);
                }
            },
            _ => {}
        },
        FocusTarget::Field(_) => {}
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, state: &WizardState) {
    let window_area = centered_rect(area, WINDOW_WIDTH, WINDOW_HEIGHT);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("Callout Wizard");
    f.render_widget(outer_block, window_area);

    // Inner layout: banner + content + buttons row
    let inner = window_area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(BANNER_WIDTH), Constraint::Min(0)].as_ref())
        .split(rows[0]);

    draw_banner(f, cols[0], state);
    draw_content(f, cols[1], state);
    draw_buttons(f, rows[1], state);

    if let Some(browser) = &state.browser {
        draw_browser(f, window_area, browser);
    }

    match &state.modal {
        Some(Modal::ConfirmCancel) => draw_cancel_modal(f, window_area, state),
        Some(Modal::Message { title, body, .. }) => draw_message_modal(f, window_area, title, body),
        None => {}
    }
}

fn draw_banner(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState) {
    let mut lines: Vec<Line> = ASCII_LOGO.lines().map(Line::from).collect();
    lines.push(Line::from("       W I Z A R D"));
    lines.push(Line::from(""));

    let cursor = state.wizard.current_index();
    for (i, step) in state.wizard.steps().iter().enumerate() {
        let pointer = if i == cursor { ">" } else { " " };
        let mark = if state.wizard.is_step_complete(i) {
            "[x]"
        } else {
            "[ ]"
        };
        let style = if i == cursor {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{} {} F{} {}", pointer, mark, i + 1, step_label(step.id().as_str())),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("F{} Saved callouts", BROWSE_KEY),
        Style::default().fg(Color::DarkGray),
    )));

    let banner = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(banner, area);
}

fn draw_content(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState) {
    let page = current_page(state);
    let title = format!(
        "{} (step {} of {})",
        page_title(page),
        state.wizard.current_index() + 1,
        state.wizard.len()
    );
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(inner);

    let focused = state.focus == FocusTarget::Content;
    match page {
        Page::Map => draw_map_grid(f, rows[0], state, focused),
        Page::Hero => {
            let selected = state
                .wizard
                .selection(HERO_KEY)
                .and_then(Selection::as_hero)
                .map(|h| h.id.as_str());
            let items: Vec<(String, bool)> = state
                .catalog
                .heroes
                .iter()
                .map(|h| {
                    let label = match &h.local_name {
                        Some(local) => format!("{} ({})", h.display_name, local),
                        None => h.display_name.clone(),
                    };
                    (label, selected == Some(h.id.as_str()))
                })
                .collect();
            draw_list(
                f,
                rows[0],
                "Up/Down to browse, Space selects, Enter selects and continues.",
                &items,
                state.hero_index,
                focused,
            );
        }
        Page::Side => draw_side(f, rows[0], state, focused),
        Page::Ability => {
            let selected = state
                .wizard
                .selection(ABILITY_KEY)
                .and_then(Selection::as_ability)
                .map(|a| a.id.clone());
            let items: Vec<(String, bool)> = current_abilities(state)
                .into_iter()
                .map(|a| {
                    let key = a.key.as_deref().unwrap_or("-");
                    let is_selected = selected.as_deref() == Some(a.id.as_str());
                    (format!("[{}] {}", key, a.display_name), is_selected)
                })
                .collect();
            draw_list(
                f,
                rows[0],
                "Abilities of the selected hero.",
                &items,
                state.ability_index,
                focused,
            );
        }
        Page::Details => draw_details(f, rows[0], state),
    }

    let mut footer = Vec::new();
    if let Some(status) = &state.status {
        footer.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(reason) = state.wizard.current_unmet_requirement() {
        footer.push(Line::from(Span::styled(
            format!("Needed: {}", reason),
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(
        Paragraph::new(Text::from(footer)).wrap(Wrap { trim: true }),
        rows[1],
    );
}

fn item_style(highlighted: bool, selected: bool, focused: bool) -> Style {
    let mut style = Style::default();
    if selected {
        style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
    }
    if highlighted {
        style = style.add_modifier(if focused {
            Modifier::REVERSED
        } else {
            Modifier::UNDERLINED
        });
    }
    style
}

fn draw_map_grid(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState, focused: bool) {
    let maps = &state.catalog.maps;
    let mut lines = vec![
        Line::from("Arrows move, Space selects, Enter selects and continues."),
        Line::from(""),
    ];
    if maps.is_empty() {
        lines.push(Line::from("No maps in the catalog."));
        f.render_widget(Paragraph::new(Text::from(lines)), area);
        return;
    }

    let cols = map_columns(state, area.width);
    let selected = state
        .wizard
        .selection(MAP_KEY)
        .and_then(Selection::as_map)
        .map(|m| m.id.as_str());
    let width = state.card_width as usize;

    // Each card row takes two lines (card + gap).
    let (cursor_row, _) = grid_position(state.map_index, cols);
    let visible_rows = (area.height.saturating_sub(2) as usize / 2).max(1);
    let first_row = (cursor_row + 1).saturating_sub(visible_rows);

    for (row, chunk) in maps
        .chunks(cols)
        .enumerate()
        .skip(first_row)
        .take(visible_rows)
    {
        let mut spans = vec![Span::raw(" ".repeat(GRID_MARGIN as usize))];
        for (col, map) in chunk.iter().enumerate() {
            if col > 0 {
                spans.push(Span::raw(" ".repeat(state.card_spacing as usize)));
            }
            let is_selected = selected == Some(map.id.as_str());
            let label = if is_selected {
                format!("* {}", map.display_name)
            } else {
                map.display_name.clone()
            };
            let label: String = label.chars().take(width).collect();
            spans.push(Span::styled(
                format!("{:^w$}", label, w = width),
                item_style(row * cols + col == state.map_index, is_selected, focused),
            ));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    f.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn draw_list(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    hint: &str,
    items: &[(String, bool)],
    highlighted: usize,
    focused: bool,
) {
    let mut lines = vec![Line::from(hint.to_string()), Line::from("")];
    if items.is_empty() {
        lines.push(Line::from("(nothing to choose from)"));
    }

    let list_height = (area.height.saturating_sub(2) as usize).max(1);
    let start = (highlighted + 1).saturating_sub(list_height);
    for (i, (label, selected)) in items.iter().enumerate().skip(start).take(list_height) {
        let marker = if *selected { "(x)" } else { "( )" };
        lines.push(Line::from(Span::styled(
            format!("{} {}", marker, label),
            item_style(i == highlighted, *selected, focused),
        )));
    }

    f.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_side(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState, focused: bool) {
    let selected = state.wizard.selection(SIDE_KEY).and_then(Selection::as_side);
    let option = |side: Side| {
        let marker = if selected == Some(side) { "(x)" } else { "( )" };
        Span::styled(
            format!("{} {}", marker, side.label()),
            item_style(state.side_choice == side, selected == Some(side), focused),
        )
    };

    let lines = vec![
        Line::from("Which side is this callout for?"),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            option(Side::Attack),
            Span::raw("    "),
            option(Side::Defense),
        ]),
        Line::from(""),
        Line::from("Left/Right to change, Space selects, Enter selects and continues."),
    ];
    f.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        area,
    );
}

fn field_line(label: &str, input: &TextInput, focused: bool) -> Line<'static> {
    let prefix = if focused { ">" } else { " " };
    let caret = if focused { "_" } else { "" };
    let text = format!("{} {:<19} {}{}", prefix, format!("{}:", label), input.value, caret);
    if focused {
        Line::from(Span::styled(text, Style::default().add_modifier(Modifier::BOLD)))
    } else {
        Line::from(text)
    }
}

/// Multi-line notes: the last few lines, continuation lines aligned under the first.
fn notes_lines(label: &str, input: &TextInput, focused: bool) -> Vec<Line<'static>> {
    let all: Vec<&str> = input.value.split('\n').collect();
    let hidden = all.len().saturating_sub(NOTES_VISIBLE_LINES);
    let label = if hidden > 0 {
        format!("{} (+{})", label, hidden)
    } else {
        label.to_string()
    };

    let style = if focused {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let shown = &all[hidden..];
    shown
        .iter()
        .enumerate()
        .map(|(n, text)| {
            let head = match (n, focused) {
                (0, true) => format!("> {:<19} ", format!("{}:", label)),
                (0, false) => format!("  {:<19} ", format!("{}:", label)),
                _ => " ".repeat(22),
            };
            let caret = if focused && n + 1 == shown.len() { "_" } else { "" };
            Line::from(Span::styled(format!("{}{}{}", head, text, caret), style))
        })
        .collect()
}

fn draw_details(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState) {
    let mut lines = Vec::new();
    for (i, label) in FORM_FIELDS.iter().enumerate() {
        let focused = state.focus == FocusTarget::Field(i);
        if i == NOTES_FIELD {
            lines.extend(notes_lines(label, &state.inputs[i], focused));
            if focused {
                lines.push(Line::from(Span::styled(
                    "  Enter starts a new line, Tab moves on.",
                    Style::default().fg(Color::DarkGray),
                )));
            }
        } else {
            lines.push(field_line(label, &state.inputs[i], focused));
        }
    }

    lines.push(Line::from(""));
    lines.push(field_line(
        &format!("{} image", state.image_kind.as_str()),
        &state.inputs[IMAGE_FIELD],
        state.focus == FocusTarget::Field(IMAGE_FIELD),
    ));
    lines.push(Line::from(Span::styled(
        "  Enter attaches, Up/Down changes the kind, Delete on an empty path removes the last image.",
        Style::default().fg(Color::DarkGray),
    )));

    if state.images.is_empty() {
        lines.push(Line::from("  No images attached."));
    }
    for kind in ImageKind::ALL {
        for img in state.images.iter().filter(|i| i.kind == kind) {
            lines.push(Line::from(format!(
                "  - {}: {}",
                kind.as_str(),
                img.path.display()
            )));
        }
    }

    f.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, state: &WizardState) {
    let back = button_text(
        "Back",
        matches!(state.focus, FocusTarget::Button(ButtonFocus::Back)),
        state.back_enabled,
    );
    let next = button_text(
        next_label(state),
        matches!(state.focus, FocusTarget::Button(ButtonFocus::Next)),
        state.next_enabled,
    );
    let cancel = button_text(
        "Cancel",
        matches!(state.focus, FocusTarget::Button(ButtonFocus::Cancel)),
        true,
    );

    let line = Line::from(vec![back, Span::raw(" "), next, Span::raw(" "), cancel]);

    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn draw_cancel_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, state: &WizardState) {
    let area = centered_rect(window_area, 56, 7);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Discard callout?");
    let body = Paragraph::new(Text::from(vec![
        Line::from("Nothing has been saved yet. Your selections will be lost."),
        Line::from(""),
        Line::from(""),
    ]))
    .block(block)
    .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    // Buttons: [Yes, cancel] [No] (primary on right)
    let buttons_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    };

    let reversed_if = |on: bool| {
        if on {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        }
    };
    let yes = Span::styled(
        "[ Yes, cancel ]",
        reversed_if(focused_button(state) == ButtonFocus::Cancel),
    );
    let no = Span::styled("[ No ]", reversed_if(focused_button(state) == ButtonFocus::Next));

    let line = Line::from(vec![yes, Span::raw(" "), no]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, buttons_area);
}

fn draw_message_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, title: &str, body: &str) {
    let area = centered_rect(window_area, 70, 10);
    f.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let p = Paragraph::new(Text::from(body.to_string()))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    let buttons_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    };
    let ok = Span::styled("[ OK ]", Style::default().add_modifier(Modifier::REVERSED));
    let p = Paragraph::new(Text::from(Line::from(vec![ok]))).alignment(Alignment::Right);
    f.render_widget(p, buttons_area);
}

fn draw_browser(f: &mut ratatui::Frame<'_>, window_area: Rect, browser: &Browser) {
    let area = centered_rect(window_area, 90, 24);
    f.render_widget(Clear, area);

    let scope = if browser.all {
        "all"
    } else {
        "matching current selections"
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Saved callouts ({})", scope));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(7),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(inner);

    let mut lines = Vec::new();
    if let Some(error) = &browser.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else if browser.records.is_empty() {
        lines.push(Line::from("No saved callouts."));
    }
    let height = (rows[0].height as usize).max(1);
    let start = (browser.index + 1).saturating_sub(height);
    for (i, record) in browser.records.iter().enumerate().skip(start).take(height) {
        lines.push(Line::from(Span::styled(
            format!(
                "{}  {}",
                record.created_at.format("%Y-%m-%d %H:%M"),
                record.summary()
            ),
            item_style(i == browser.index, false, true),
        )));
    }
    f.render_widget(Paragraph::new(Text::from(lines)), rows[0]);

    if let Some(record) = browser.records.get(browser.index) {
        let form = &record.form;
        let pair = |main: &str, detail: &str| {
            if detail.trim().is_empty() {
                main.to_string()
            } else {
                format!("{} ({})", main, detail)
            }
        };
        let detail = vec![
            Line::from(format!(
                "Position:   {}",
                pair(&form.position, &form.position_detail)
            )),
            Line::from(format!(
                "Aim point:  {}",
                pair(&form.aim_point, &form.aim_point_detail)
            )),
            Line::from(format!(
                "Drop point: {}",
                pair(&form.drop_point, &form.drop_point_detail)
            )),
            Line::from(format!(
                "Notes:      {}",
                form.notes.lines().next().unwrap_or("")
            )),
            Line::from(format!("Images:     {}", form.images.len())),
        ];
        f.render_widget(
            Paragraph::new(Text::from(detail))
                .block(Block::default().borders(Borders::TOP))
                .wrap(Wrap { trim: true }),
            rows[1],
        );
    }

    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "Up/Down browse, Tab toggles all, Delete removes, Esc closes.",
            Style::default().fg(Color::DarkGray),
        ))),
        rows[2],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetreatSetting;
    use std::path::Path;

    fn test_state(dir: &Path, policy: RetreatSetting) -> WizardState {
        let config = AppConfig {
            data_dir: dir.to_path_buf(),
            retreat_policy: policy,
            ..AppConfig::default()
        };
        WizardState::new(Catalog::builtin(), CalloutStore::new(dir), &config).expect("state")
    }

    fn render(state: &WizardState) -> String {
        let mut terminal =
            Terminal::new(TestBackend::new(WINDOW_WIDTH, WINDOW_HEIGHT)).expect("terminal");
        terminal
            .draw(|f| draw(f.size(), f, state))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn type_text(state: &mut WizardState, text: &str) {
        for c in text.chars() {
            handle_key(state, KeyCode::Char(c));
        }
    }

    fn focus_button(state: &mut WizardState, target: ButtonFocus) {
        for _ in 0..(DETAILS_FIELD_COUNT + 4) {
            if state.focus == FocusTarget::Button(target) {
                return;
            }
            handle_key(state, KeyCode::Tab);
        }
        panic!("could not focus {:?}", target);
    }

    /// Enter on each picker page: select the highlighted item and continue.
    fn walk_to_details(state: &mut WizardState) {
        for _ in 0..4 {
            handle_key(state, KeyCode::Enter);
        }
        assert_eq!(current_page(state), Page::Details);
    }

    #[test]
    fn buttons_follow_controller_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        assert!(!state.back_enabled);
        assert!(!state.next_enabled);

        handle_key(&mut state, KeyCode::Char(' '));
        assert!(state.next_enabled, "selecting a map enables Next");
        assert_eq!(current_page(&state), Page::Map);

        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(current_page(&state), Page::Hero);
        assert!(state.back_enabled);
        assert!(!state.next_enabled, "no hero selected yet");
    }

    #[test]
    fn next_on_incomplete_step_shows_reason() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        focus_button(&mut state, ButtonFocus::Next);

        handle_key(&mut state, KeyCode::Enter);
        match &state.modal {
            Some(Modal::Message { body, .. }) => {
                assert!(body.contains("no 'map' selected yet"), "{}", body)
            }
            other => panic!("expected message modal, got {:?}", other),
        }
        assert_eq!(state.wizard.current_index(), 0);

        handle_key(&mut state, KeyCode::Enter);
        assert!(state.modal.is_none());
        assert!(!state.quit);
    }

    #[test]
    fn back_on_first_step_reports_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        focus_button(&mut state, ButtonFocus::Back);

        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(state.status.as_deref(), Some("Already at the first step."));
        assert!(state.modal.is_none());
    }

    #[test]
    fn map_grid_moves_by_column_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        let cols = map_columns(&state, content_width_for(state.screen_width));

        handle_key(&mut state, KeyCode::Down);
        assert_eq!(state.map_index, cols);
        handle_key(&mut state, KeyCode::Right);
        assert_eq!(state.map_index, cols + 1);
        handle_key(&mut state, KeyCode::Up);
        assert_eq!(state.map_index, 1);
        assert!(state.wizard.registry().is_empty(), "moving does not select");
    }

    #[test]
    fn completing_the_form_saves_a_callout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        walk_to_details(&mut state);
        assert_eq!(state.focus, FocusTarget::Field(0));
        assert!(!state.next_enabled);

        type_text(&mut state, "B long");
        assert!(state.next_enabled, "position filled");
        assert!(render(&state).contains("[ Save ]"));

        focus_button(&mut state, ButtonFocus::Next);
        handle_key(&mut state, KeyCode::Enter);

        assert!(state.saved_path.is_some());
        assert!(matches!(
            state.modal,
            Some(Modal::Message { quit_on_close: true, .. })
        ));
        let saved = state.store.list().expect("list");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].form.position, "B long");
        assert_eq!(saved[0].map.id, Catalog::builtin().maps[0].id);

        handle_key(&mut state, KeyCode::Enter);
        assert!(state.quit);
    }

    #[test]
    fn escape_asks_before_quitting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);

        handle_key(&mut state, KeyCode::Esc);
        assert_eq!(state.modal, Some(Modal::ConfirmCancel));
        handle_key(&mut state, KeyCode::Enter);
        assert!(state.modal.is_none());
        assert!(!state.quit, "default answer is No");

        handle_key(&mut state, KeyCode::Esc);
        handle_key(&mut state, KeyCode::Tab);
        handle_key(&mut state, KeyCode::Enter);
        assert!(state.quit);
    }

    #[test]
    fn function_keys_jump_between_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);

        handle_key(&mut state, KeyCode::F(3));
        assert!(matches!(state.modal, Some(Modal::Message { .. })));
        assert_eq!(state.wizard.current_index(), 0);
        handle_key(&mut state, KeyCode::Esc);

        handle_key(&mut state, KeyCode::F(9));
        assert!(state.modal.is_none(), "out-of-range jumps only set the status");
        assert!(state.status.as_deref().unwrap_or("").contains("out of range"));

        walk_to_details(&mut state);
        handle_key(&mut state, KeyCode::F(2));
        assert_eq!(current_page(&state), Page::Hero);
        assert_eq!(state.focus, FocusTarget::Content);
    }

    #[test]
    fn preserve_policy_restores_form_on_return() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        walk_to_details(&mut state);
        type_text(&mut state, "Heaven");

        focus_button(&mut state, ButtonFocus::Back);
        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(current_page(&state), Page::Ability);
        assert!(state.wizard.has_selection(DETAILS_KEY));

        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(current_page(&state), Page::Details);
        assert_eq!(state.inputs[0].value, "Heaven");
    }

    #[test]
    fn clear_forward_policy_resets_form_on_return() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::ClearForward);
        walk_to_details(&mut state);
        type_text(&mut state, "Heaven");

        focus_button(&mut state, ButtonFocus::Back);
        handle_key(&mut state, KeyCode::Enter);
        assert!(!state.wizard.has_selection(DETAILS_KEY));

        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(current_page(&state), Page::Details);
        assert!(state.inputs[0].value.is_empty());
    }

    #[test]
    fn images_attach_through_the_form() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        walk_to_details(&mut state);
        type_text(&mut state, "Hookah");
        state.focus = FocusTarget::Field(IMAGE_FIELD);

        type_text(&mut state, "notes.txt");
        handle_key(&mut state, KeyCode::Enter);
        assert!(state.images.is_empty());
        assert!(state.status.is_some());

        state.inputs[IMAGE_FIELD].set("shots/aim.png");
        handle_key(&mut state, KeyCode::Down);
        assert_eq!(state.image_kind, ImageKind::AimPoint);
        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(state.images.len(), 1);
        assert!(state.inputs[IMAGE_FIELD].value.is_empty());
        let form = state
            .wizard
            .selection(DETAILS_KEY)
            .and_then(Selection::as_details)
            .cloned()
            .expect("details");
        assert_eq!(form.images_of(ImageKind::AimPoint).count(), 1);

        handle_key(&mut state, KeyCode::Delete);
        assert!(state.images.is_empty());
    }

    #[test]
    fn banner_marks_completed_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        handle_key(&mut state, KeyCode::Enter);

        let screen = render(&state);
        assert!(screen.contains("[x] F1 Map"), "{}", screen);
        assert!(screen.contains("> [ ] F2 Hero"), "{}", screen);
        assert!(screen.contains("Select a hero (step 2 of 5)"));
    }

    #[test]
    fn text_input_handles_multibyte_characters() {
        let mut input = TextInput::default();
        input.handle_key(KeyCode::Char('é'));
        input.handle_key(KeyCode::Left);
        input.handle_key(KeyCode::Char('x'));
        assert_eq!(input.value, "xé");
        input.handle_key(KeyCode::End);
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.value, "x");
    }

    #[test]
    fn catalog_errors_are_reported_in_a_modal() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("maps.json"), "{ not json").expect("write");
        let config = AppConfig {
            catalog_dir: dir.path().to_path_buf(),
            data_dir: dir.path().join("callouts"),
            ..AppConfig::default()
        };

        let state = new_wizard_state(&config).expect("state");
        assert!(matches!(
            &state.modal,
            Some(Modal::Message { title, .. }) if title == "Catalog error"
        ));
        assert_eq!(state.catalog, Catalog::builtin());
    }

    #[test]
    fn smoke_renders_every_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        for target in [
            "map", "hero", "side", "ability", "details", "invalid", "cancel", "browse", "unknown",
        ] {
            smoke(&config, target).unwrap_or_else(|e| panic!("{}: {:#}", target, e));
        }

        let details = new_smoke_wizard_state(&config, "details").expect("state");
        assert_eq!(current_page(&details), Page::Details);
        assert!(details.next_enabled);
        assert!(render(&details).contains("A main, behind the left box"));
        assert!(
            std::fs::read_dir(dir.path()).expect("read").next().is_none(),
            "smoke never saves"
        );
    }

    #[test]
    fn notes_accept_several_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        walk_to_details(&mut state);
        type_text(&mut state, "Garage");
        handle_key(&mut state, KeyCode::Enter);
        assert_eq!(state.focus, FocusTarget::Field(1), "Enter moves on from single-line fields");

        state.focus = FocusTarget::Field(NOTES_FIELD);
        type_text(&mut state, "Smoke early");
        handle_key(&mut state, KeyCode::Enter);
        type_text(&mut state, "then push");
        assert_eq!(state.focus, FocusTarget::Field(NOTES_FIELD));

        let form = state
            .wizard
            .selection(DETAILS_KEY)
            .and_then(Selection::as_details)
            .cloned()
            .expect("details");
        assert_eq!(form.notes, "Smoke early\nthen push");
        assert!(state.next_enabled, "newlines in notes keep the form valid");

        let screen = render(&state);
        assert!(screen.contains("Smoke early"), "{}", screen);
        assert!(screen.contains("then push_"), "{}", screen);
    }

    #[test]
    fn long_notes_show_the_last_lines() {
        let mut input = TextInput::default();
        input.set("one\ntwo\nthree\nfour\nfive\nsix");
        let lines: Vec<String> = notes_lines("Notes", &input, false)
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(lines.len(), NOTES_VISIBLE_LINES);
        assert!(lines[0].contains("Notes (+2):"), "{:?}", lines);
        assert!(lines[0].ends_with("three"));
        assert!(lines[3].ends_with("six"));
    }

    fn saved(dir: &Path, map: &str, position: &str) -> CalloutRecord {
        let catalog = Catalog::builtin();
        let hero = catalog.heroes[0].clone();
        let record = CalloutRecord {
            id: uuid::Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            map: catalog.map(map).cloned().expect("map"),
            ability: hero.abilities[0].clone(),
            hero,
            side: Side::Attack,
            form: CalloutForm {
                position: position.to_string(),
                ..CalloutForm::default()
            },
        };
        CalloutStore::new(dir).save(&record).expect("save");
        record
    }

    #[test]
    fn browser_lists_callouts_for_the_selected_map() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = test_state(dir.path(), RetreatSetting::Preserve);
        let first_map = Catalog::builtin().maps[0].id.clone();
        saved(dir.path(), &first_map, "Market");
        saved(dir.path(), "fracture", "Dish");

        handle_key(&mut state, KeyCode::Char(' '));
        handle_key(&mut state, KeyCode::F(BROWSE_KEY));
        let browser = state.browser.as_ref().expect("browser open");
        assert_eq!(browser.records.len(), 1);
        assert_eq!(browser.records[0].form.position, "Market");
        let screen = render(&state);
        assert!(screen.contains("Saved callouts (matching current selections)"), "{}", screen);
        assert!(screen.contains("Market"));

        handle_key(&mut state, KeyCode::Tab);
        assert_eq!(state.browser.as_ref().map(|b| b.records.len()), Some(2));

        handle_key(&mut state, KeyCode::Down);
        handle_key(&mut state, KeyCode::Delete);
        let browser = state.browser.as_ref().expect("browser open");
        assert_eq!(browser.records.len(), 1);
        assert_eq!(browser.index, 0);
        assert_eq!(state.store.list().expect("list").len(), 1);

        handle_key(&mut state, KeyCode::Esc);
        assert!(state.browser.is_none());
        assert!(state.modal.is_none(), "Esc closes the browser without asking to quit");
        assert_eq!(current_page(&state), Page::Map);
    }
}
