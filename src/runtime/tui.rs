//! TUI runtime (Phase 5).

use std::cell::RefCell;
use std::env;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::core::component::Component;
use crate::core::cursor::{CursorPos, CURSOR_MARKER};
use crate::core::input::{is_kitty_query_response, KeyEventType};
use crate::core::input_event::{parse_input_events, InputEvent};
use crate::core::output::{osc_title_sequence, OutputGate, TerminalCmd};
use crate::core::terminal::Terminal;
use crate::core::terminal_image::{
    get_capabilities, is_image_line, set_cell_dimensions, CellDimensions, TerminalImageState,
};
use crate::render::overlay::{
    composite_overlays, resolve_overlay_layout, OverlayOptions, RenderedOverlay,
};
use crate::render::renderer::DiffRenderer;
use crate::render::Frame;
use crate::runtime::focus::FocusState;
use crate::runtime::ime::position_hardware_cursor;

const STOP_DRAIN_MAX_MS: u64 = 1000;
const STOP_DRAIN_IDLE_MS: u64 = 50;
const COALESCE_MAX_DURATION_MS: u64 = 2;
const COALESCE_MAX_ITERATIONS: usize = 8;

type ComponentRc = Rc<RefCell<Box<dyn Component>>>;

#[derive(Clone, Copy, Debug)]
struct CoalesceBudget {
    max_duration: Duration,
    max_iterations: usize,
}

impl Default for CoalesceBudget {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_millis(COALESCE_MAX_DURATION_MS),
            max_iterations: COALESCE_MAX_ITERATIONS,
        }
    }
}

impl CoalesceBudget {
    fn allows(&self, start: Instant, iterations: usize) -> bool {
        start.elapsed() < self.max_duration && iterations < self.max_iterations
    }
}

#[derive(Debug, Default)]
struct CrashCleanup {
    ran: AtomicBool,
}

impl CrashCleanup {
    fn run<T: Terminal>(&self, terminal: &mut T) {
        if self.ran.swap(true, Ordering::SeqCst) {
            return;
        }

        // Crash/signal cleanup is best-effort: we may not know which protocol toggles
        // actually succeeded before the failure. These control sequences are safe and
        // idempotent (and are ignored by terminals that don't implement them).
        let mut output = OutputGate::new();
        output.push(TerminalCmd::ShowCursor);
        output.push(TerminalCmd::BracketedPasteDisable);
        output.push(TerminalCmd::KittyDisable);
        output.flush(terminal);
    }

    #[cfg(all(unix, not(test)))]
    fn run_best_effort(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut terminal = crate::platform::process_terminal::HookTerminal::new();
            self.run(&mut terminal);
        }));
    }
}

pub struct TuiRuntime<T: Terminal> {
    terminal: T,
    output: OutputGate,
    terminal_image_state: Arc<TerminalImageState>,
    root: ComponentRc,
    renderer: DiffRenderer,
    focus: FocusState,
    overlays: Rc<RefCell<OverlayState>>,
    on_debug: Option<Box<dyn FnMut()>>,
    clear_on_shrink: bool,
    show_hardware_cursor: bool,
    stopped: bool,
    wake: Arc<RuntimeWake>,
    coalesce_budget: CoalesceBudget,
    input_buffer: String,
    cell_size_query_pending: bool,
    kitty_keyboard_enabled: bool,
    kitty_enable_pending: bool,
    #[cfg(all(unix, not(test)))]
    signal_hook_guard: Option<crate::platform::SignalHookGuard>,
    #[cfg(all(unix, not(test)))]
    panic_hook_guard: Option<crate::platform::PanicHookGuard>,
}

#[derive(Default)]
struct OverlayState {
    entries: Vec<OverlayEntry>,
    next_id: u64,
    dirty: bool,
    pending_pre_focus: Option<ComponentRc>,
}

struct OverlayEntry {
    id: u64,
    component: ComponentRc,
    options: Option<OverlayOptions>,
    pre_focus: Option<ComponentRc>,
    hidden: bool,
}

pub struct OverlayHandle {
    id: u64,
    state: std::rc::Weak<RefCell<OverlayState>>,
    wake: Arc<RuntimeWake>,
}

#[derive(Default)]
struct RuntimeWakeState {
    pending_inputs: Vec<String>,
    pending_resize: bool,
    render_requested: bool,
    pending_title: Option<String>,
    stop_requested: bool,
}

#[derive(Default)]
struct RuntimeWake {
    state: Mutex<RuntimeWakeState>,
    cvar: Condvar,
}

impl RuntimeWake {
    fn wait_for_event(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        while !state.stop_requested
            && state.pending_inputs.is_empty()
            && !state.pending_resize
            && !state.render_requested
            && state.pending_title.is_none()
        {
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        !state.stop_requested
    }

    fn enqueue_input(&self, data: String) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending_inputs.push(data);
        self.cvar.notify_one();
    }

    fn signal_resize(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending_resize = true;
        self.cvar.notify_one();
    }

    fn request_render(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.render_requested = true;
        self.cvar.notify_one();
    }

    fn set_title(&self, title: String) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending_title = Some(title);
        self.cvar.notify_one();
    }

    fn take_pending_resize(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pending = state.pending_resize;
        state.pending_resize = false;
        pending
    }

    fn take_pending_title(&self) -> Option<String> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending_title.take()
    }

    fn drain_inputs(&self) -> Vec<String> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut state.pending_inputs)
    }

    fn take_render_requested(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let requested = state.render_requested;
        state.render_requested = false;
        requested
    }

    fn peek_render_requested(&self) -> bool {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.render_requested
    }

    fn clear_render_requested(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.render_requested = false;
    }

    fn has_pending_non_render(&self) -> bool {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending_resize || !state.pending_inputs.is_empty() || state.pending_title.is_some()
    }

    fn reset_for_start(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.stop_requested = false;
        state.pending_resize = false;
        state.pending_inputs.clear();
        state.render_requested = false;
        state.pending_title = None;
    }

    fn request_stop(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.stop_requested = true;
        self.cvar.notify_all();
    }

    #[cfg(test)]
    fn wait_for_event_with_before_wait<F: FnOnce()>(&self, before_wait: F) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut before_wait = Some(before_wait);
        while !state.stop_requested
            && state.pending_inputs.is_empty()
            && !state.pending_resize
            && !state.render_requested
            && state.pending_title.is_none()
        {
            if let Some(before_wait) = before_wait.take() {
                before_wait();
            }
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        !state.stop_requested
    }
}

#[derive(Clone)]
pub struct RenderHandle {
    wake: Arc<RuntimeWake>,
}

impl RenderHandle {
    pub fn request_render(&self) {
        self.wake.request_render();
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.wake.set_title(title.into());
    }
}

impl OverlayHandle {
    pub fn hide(&self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.borrow_mut();
            if let Some(index) = state.entries.iter().position(|entry| entry.id == self.id) {
                let entry = state.entries.remove(index);
                if let Some(pre_focus) = entry.pre_focus {
                    state.pending_pre_focus = Some(pre_focus);
                }
                state.dirty = true;
                self.wake.request_render();
            }
        }
    }

    pub fn set_hidden(&self, hidden: bool) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.borrow_mut();
            if let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == self.id) {
                if entry.hidden != hidden {
                    entry.hidden = hidden;
                    state.dirty = true;
                    self.wake.request_render();
                }
            }
        }
    }

    pub fn is_hidden(&self) -> bool {
        if let Some(state) = self.state.upgrade() {
            let state = state.borrow();
            if let Some(entry) = state.entries.iter().find(|entry| entry.id == self.id) {
                return entry.hidden;
            }
        }
        false
    }
}

impl<T: Terminal> TuiRuntime<T> {
    pub fn new(terminal: T, root: ComponentRc) -> Self {
        let clear_on_shrink = env_flag("PI_CLEAR_ON_SHRINK");
        let show_hardware_cursor = env_flag("PI_HARDWARE_CURSOR");
        Self {
            terminal,
            output: OutputGate::new(),
            terminal_image_state: Arc::new(TerminalImageState::default()),
            root,
            renderer: DiffRenderer::new(),
            focus: FocusState::new(),
            overlays: Rc::new(RefCell::new(OverlayState::default())),
            on_debug: None,
            clear_on_shrink,
            show_hardware_cursor,
            stopped: true,
            wake: Arc::new(RuntimeWake::default()),
            coalesce_budget: CoalesceBudget::default(),
            input_buffer: String::new(),
            cell_size_query_pending: false,
            kitty_keyboard_enabled: false,
            kitty_enable_pending: false,
            #[cfg(all(unix, not(test)))]
            signal_hook_guard: None,
            #[cfg(all(unix, not(test)))]
            panic_hook_guard: None,
        }
    }

    pub fn set_on_debug(&mut self, handler: Option<Box<dyn FnMut()>>) {
        self.on_debug = handler;
    }

    #[cfg(test)]
    fn set_coalesce_budget_for_tests(&mut self, budget: CoalesceBudget) {
        self.coalesce_budget = budget;
    }

    pub fn render_handle(&self) -> RenderHandle {
        RenderHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    /// Set the terminal window/tab title.
    ///
    /// While running, this queues a title update that flushes on the runtime thread
    /// without forcing a render. When stopped, it writes immediately.
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.stopped {
            let mut output = OutputGate::new();
            output.push(TerminalCmd::Bytes(osc_title_sequence(&title)));
            output.flush(&mut self.terminal);
            return;
        }
        self.wake.set_title(title);
    }

    /// Enqueue a show-cursor command.
    ///
    /// This only enqueues terminal protocol bytes into the runtime output gate. The bytes are
    /// normally flushed at tick boundaries (e.g. `run_once` / `render_if_needed` / `render_now`).
    /// If you need the cursor visibility to change immediately without forcing a render, call
    /// [`TuiRuntime::flush_pending_output`].
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn show_cursor(&mut self) {
        if self.stopped {
            return;
        }
        self.output.push(TerminalCmd::ShowCursor);
    }

    /// Enqueue a hide-cursor command.
    ///
    /// This only enqueues terminal protocol bytes into the runtime output gate. The bytes are
    /// normally flushed at tick boundaries (e.g. `run_once` / `render_if_needed` / `render_now`).
    /// If you need the cursor visibility to change immediately without forcing a render, call
    /// [`TuiRuntime::flush_pending_output`].
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn hide_cursor(&mut self) {
        if self.stopped {
            return;
        }
        self.output.push(TerminalCmd::HideCursor);
    }

    /// Clear from the cursor to end-of-line, then force a full redraw next render.
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn clear_line(&mut self) {
        if self.stopped {
            return;
        }
        self.output.push(TerminalCmd::ClearLine);
        self.renderer.request_full_redraw_next();
        self.request_render();
    }

    /// Clear from cursor to end of screen, then force a full redraw next render.
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn clear_from_cursor(&mut self) {
        if self.stopped {
            return;
        }
        self.output.push(TerminalCmd::ClearFromCursor);
        self.renderer.request_full_redraw_next();
        self.request_render();
    }

    /// Clear the screen and reset the renderer as if the terminal was externally cleared.
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn clear_screen(&mut self) {
        if self.stopped {
            return;
        }
        self.output.push(TerminalCmd::ClearScreen);
        self.renderer.reset_for_external_clear_screen();
        self.request_render();
    }

    /// Move the cursor up/down by a number of lines, without requesting a render.
    ///
    /// This updates the renderer's internal cursor model so the next render can place
    /// the cursor deterministically without desync.
    ///
    /// This only enqueues terminal protocol bytes into the runtime output gate. The bytes are
    /// normally flushed at tick boundaries (e.g. `run_once` / `render_if_needed` / `render_now`).
    /// If you need the cursor move to take effect immediately without forcing a render, call
    /// [`TuiRuntime::flush_pending_output`].
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn move_by(&mut self, lines: i32) {
        if self.stopped {
            return;
        }
        if lines == 0 {
            return;
        }
        if lines > 0 {
            self.output.push(TerminalCmd::MoveDown(lines as usize));
        } else {
            self.output.push(TerminalCmd::MoveUp((-lines) as usize));
        }
        self.renderer
            .apply_out_of_band_move_by(lines, self.terminal.rows() as usize);
    }

    pub fn terminal_rows(&self) -> u16 {
        self.terminal.rows()
    }

    pub fn terminal_columns(&self) -> u16 {
        self.terminal.columns()
    }

    pub fn kitty_protocol_active(&self) -> bool {
        self.kitty_keyboard_enabled || self.kitty_enable_pending
    }

    /// Force the next render to redraw the entire viewport (without clearing scrollback).
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn request_full_redraw(&mut self) {
        if self.stopped {
            return;
        }
        self.renderer.request_full_redraw_next();
        self.request_render();
    }

    /// Enable/disable showing the terminal's hardware cursor.
    ///
    /// When disabling, we enqueue an explicit hide-cursor command immediately to keep
    /// terminal state consistent even if no further render happens soon.
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn set_show_hardware_cursor(&mut self, enabled: bool) {
        if self.stopped {
            return;
        }
        if self.show_hardware_cursor == enabled {
            return;
        }
        self.show_hardware_cursor = enabled;
        if !enabled {
            self.output.push(TerminalCmd::HideCursor);
        }
        self.request_render();
    }

    /// Enable/disable clearing behavior when the terminal shrinks.
    ///
    /// No-op when stopped to avoid perturbing the renderer's first-render baseline.
    pub fn set_clear_on_shrink(&mut self, enabled: bool) {
        if self.stopped {
            return;
        }
        self.clear_on_shrink = enabled;
    }

    pub fn terminal_image_state(&self) -> Arc<TerminalImageState> {
        Arc::clone(&self.terminal_image_state)
    }

    pub fn set_focus(&mut self, target: Rc<RefCell<Box<dyn Component>>>) {
        self.focus.set_focus(Some(target));
    }

    pub fn clear_focus(&mut self) {
        self.focus.clear();
    }

    pub fn show_overlay(
        &mut self,
        component: ComponentRc,
        options: Option<OverlayOptions>,
    ) -> OverlayHandle {
        let pre_focus = self.focus.focused();
        let entry = OverlayEntry {
            id: 0,
            component: Rc::clone(&component),
            options,
            pre_focus,
            hidden: false,
        };
        let visible = self.is_overlay_visible(&entry);
        let mut state = self.overlays.borrow_mut();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        let mut entry = entry;
        entry.id = id;
        state.entries.push(entry);
        state.dirty = true;
        drop(state);
        if visible {
            self.focus.set_focus(Some(component));
        }
        self.request_render();
        OverlayHandle {
            id,
            state: Rc::downgrade(&self.overlays),
            wake: Arc::clone(&self.wake),
        }
    }

    pub fn hide_overlay(&mut self) {
        let mut state = self.overlays.borrow_mut();
        let entry = state.entries.pop();
        if entry.is_some() {
            state.dirty = true;
        }
        drop(state);
        if entry.is_some() {
            self.reconcile_focus();
            self.request_render();
        }
    }

    pub fn has_overlay(&self) -> bool {
        let state = self.overlays.borrow();
        state
            .entries
            .iter()
            .any(|entry| self.is_overlay_visible(entry))
    }

    pub fn start(&mut self) -> io::Result<()> {
        self.output.clear();
        self.kitty_keyboard_enabled = false;
        self.kitty_enable_pending = false;
        self.wake.reset_for_start();

        // Mark running early so Drop can attempt cleanup if `Terminal::start()` panics.
        self.stopped = false;

        #[cfg(all(unix, not(test)))]
        self.install_cleanup_hooks();

        let wake_input = Arc::clone(&self.wake);
        let wake_resize = Arc::clone(&self.wake);
        if let Err(err) = self.terminal.start(
            Box::new(move |data| {
                wake_input.enqueue_input(data);
            }),
            Box::new(move || {
                wake_resize.signal_resize();
            }),
        ) {
            self.stopped = true;
            #[cfg(all(unix, not(test)))]
            self.uninstall_cleanup_hooks();
            return Err(err);
        }

        self.output.push(TerminalCmd::BracketedPasteEnable);
        self.output.push(TerminalCmd::KittyQuery);
        self.output.push(TerminalCmd::HideCursor);
        self.query_cell_size();
        self.flush_output();
        self.request_render();

        Ok(())
    }

    pub fn stop(&mut self) -> io::Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.wake.request_stop();
        self.place_cursor_at_end();
        self.output.push(TerminalCmd::ShowCursor);
        self.output.push(TerminalCmd::BracketedPasteDisable);
        if self.kitty_keyboard_enabled || self.kitty_enable_pending {
            self.output.push(TerminalCmd::KittyDisable);
        }
        self.flush_output();
        self.kitty_keyboard_enabled = false;
        self.kitty_enable_pending = false;
        self.terminal
            .drain_input(STOP_DRAIN_MAX_MS, STOP_DRAIN_IDLE_MS);
        let result = self.terminal.stop();
        self.stopped = true;
        #[cfg(all(unix, not(test)))]
        self.uninstall_cleanup_hooks();
        result
    }

    #[cfg(all(unix, not(test)))]
    fn install_cleanup_hooks(&mut self) {
        let cleanup = Arc::new(CrashCleanup::default());
        let signal_cleanup = Arc::clone(&cleanup);
        let panic_cleanup = Arc::clone(&cleanup);
        self.signal_hook_guard = Some(crate::platform::install_signal_handlers(move || {
            signal_cleanup.run_best_effort()
        }));
        self.panic_hook_guard = Some(crate::platform::install_panic_hook(move || {
            panic_cleanup.run_best_effort()
        }));
    }

    #[cfg(all(unix, not(test)))]
    fn uninstall_cleanup_hooks(&mut self) {
        self.signal_hook_guard = None;
        self.panic_hook_guard = None;
    }

    /// Block until at least one input/resize/render event is available, then
    /// coalesce work and render once (bounded).
    ///
    /// Note: this does **not** run an event loop until stopped; callers typically
    /// call this in a loop.
    pub fn run_blocking_once(&mut self) {
        if self.stopped {
            return;
        }

        if !self.wake.wait_for_event() {
            return;
        }

        self.run_coalesced_once();
    }

    /// Alias for [`TuiRuntime::run_blocking_once`]. Kept for compatibility.
    pub fn run(&mut self) {
        self.run_blocking_once();
    }

    #[cfg(test)]
    fn run_with_before_wait<F: FnOnce()>(&mut self, before_wait: F) {
        if self.stopped {
            return;
        }

        if !self.wake.wait_for_event_with_before_wait(before_wait) {
            return;
        }

        self.run_coalesced_once();
    }

    fn run_coalesced_once(&mut self) {
        // Coalescing contract:
        // - We drain all work already queued (and any work that arrives during the
        //   non-blocking coalescing window).
        // - If the coalescing budget expires while work remains queued, we render using
        //   the work drained so far and intentionally defer the remaining work to the next tick.
        // This is a deliberate behavior change to batch renders while bounding latency.
        let start = Instant::now();
        let mut iterations = 0;
        let mut yielded = false;

        loop {
            let mut did_work = false;

            if self.take_overlay_dirty() {
                self.reconcile_focus();
                self.request_render();
                did_work = true;
            }

            if self.wake.take_pending_resize() {
                self.reconcile_focus();
                if let Some(component) = self.focus.focused() {
                    let event = InputEvent::Resize {
                        columns: self.terminal.columns(),
                        rows: self.terminal.rows(),
                    };
                    component.borrow_mut().handle_event(&event);
                }
                self.request_render();
                did_work = true;
            }

            let inputs = self.wake.drain_inputs();
            if !inputs.is_empty() {
                for data in inputs {
                    self.handle_input(&data);
                }
                did_work = true;
            }

            if let Some(title) = self.wake.take_pending_title() {
                self.output
                    .push(TerminalCmd::Bytes(osc_title_sequence(&title)));
                did_work = true;
            }

            if !did_work {
                if self.wake.peek_render_requested() {
                    self.wake.clear_render_requested();
                    self.do_render();
                }
                break;
            }

            if !self.coalesce_budget.allows(start, iterations) {
                if self.wake.peek_render_requested() {
                    self.wake.clear_render_requested();
                    self.do_render();
                }
                break;
            }

            iterations += 1;

            if !yielded && !self.has_pending_non_render() && self.wake.peek_render_requested() {
                std::thread::yield_now();
                yielded = true;
            }
        }

        self.flush_output();
    }

    pub fn run_once(&mut self) {
        if self.stopped {
            return;
        }

        if self.take_overlay_dirty() {
            self.reconcile_focus();
            self.request_render();
        }

        if self.wake.take_pending_resize() {
            self.reconcile_focus();
            if let Some(component) = self.focus.focused() {
                let event = InputEvent::Resize {
                    columns: self.terminal.columns(),
                    rows: self.terminal.rows(),
                };
                component.borrow_mut().handle_event(&event);
            }
            self.request_render();
        }

        let inputs = self.wake.drain_inputs();

        for data in inputs {
            self.handle_input(&data);
        }

        if let Some(title) = self.wake.take_pending_title() {
            self.output
                .push(TerminalCmd::Bytes(osc_title_sequence(&title)));
        }

        self.render_if_needed();
    }

    pub fn handle_input(&mut self, data: &str) {
        self.reconcile_focus();

        let mut data = data;
        let owned;
        if self.cell_size_query_pending {
            let filtered = self.filter_cell_size_response(data);
            let Some(filtered) = filtered else {
                return;
            };
            if filtered.is_empty() {
                return;
            }
            owned = filtered;
            data = &owned;
        }

        if is_kitty_query_response(data) {
            if !self.kitty_keyboard_enabled && !self.kitty_enable_pending {
                self.output.push(TerminalCmd::KittyEnable);
                self.kitty_enable_pending = true;
            }
            return;
        }

        let events = parse_input_events(data, self.kitty_keyboard_enabled);
        if events.is_empty() {
            return;
        }

        let Some(component) = self.focus.focused() else {
            return;
        };

        let mut component = component.borrow_mut();

        let mut handled = false;
        for event in events {
            if let InputEvent::Key {
                key_id, event_type, ..
            } = &event
            {
                if *event_type == KeyEventType::Press && key_id == "ctrl+shift+d" {
                    if let Some(handler) = self.on_debug.as_mut() {
                        handler();
                    }
                    continue;
                }
                if *event_type == KeyEventType::Release && !component.wants_key_release() {
                    continue;
                }
            }

            component.handle_event(&event);
            handled = true;
        }

        if handled {
            self.request_render();
        }
    }

    pub fn request_render(&mut self) {
        self.wake.request_render();
    }

    pub fn render_if_needed(&mut self) {
        if self.wake.take_render_requested() {
            self.do_render();
        }
        self.flush_output();
    }

    pub fn render_now(&mut self) {
        self.wake.clear_render_requested();
        self.do_render();
        self.flush_output();
    }

    /// Flush queued terminal protocol bytes without rendering.
    ///
    /// Many helpers (such as [`TuiRuntime::hide_cursor`], [`TuiRuntime::show_cursor`], and
    /// [`TuiRuntime::move_by`]) enqueue bytes into the runtime output gate but do not flush
    /// immediately. The runtime typically flushes at tick boundaries (e.g. `run_once` /
    /// `render_if_needed` / `render_now`) to preserve a single, deterministic write gate.
    ///
    /// Call this when you need immediate terminal effects without forcing a render.
    pub fn flush_pending_output(&mut self) {
        if self.stopped {
            return;
        }
        self.flush_output();
    }

    fn do_render(&mut self) {
        let width = self.terminal.columns() as usize;
        let height = self.terminal.rows() as usize;
        self.reconcile_focus();
        let (mut lines, mut cursor_pos) = {
            let mut root = self.root.borrow_mut();
            root.set_terminal_rows(height);
            let lines = root.render(width);
            let cursor_pos = root.cursor_pos();
            (lines, cursor_pos)
        };

        if self.has_overlay() {
            let (composited, overlay_cursor) = self.composite_overlay_lines(lines, width, height);
            lines = composited;
            if overlay_cursor.is_some() {
                cursor_pos = overlay_cursor;
            }
        }

        if let Some(pos) = cursor_pos {
            let viewport_top = lines.len().saturating_sub(height);
            if pos.row < viewport_top || pos.row >= lines.len() {
                cursor_pos = None;
            }
        }

        // Components may emit the legacy CURSOR_MARKER APC sequence. Ensure it never
        // reaches the renderer/terminal output. If a component didn't provide typed
        // cursor metadata, use the extracted marker position as a fallback.
        let extracted_marker_pos = crate::core::cursor::extract_cursor_marker(&mut lines, height);
        for line in lines.iter_mut() {
            while let Some(idx) = line.find(CURSOR_MARKER) {
                let end = idx + CURSOR_MARKER.len();
                line.replace_range(idx..end, "");
            }
        }
        if cursor_pos.is_none() {
            cursor_pos = extracted_marker_pos;
        }

        // Clamp cursor column to the terminal width to avoid emitting huge `CSI n G` moves.
        if let Some(mut pos) = cursor_pos {
            pos.col = pos.col.min(width.saturating_sub(1));
            cursor_pos = Some(pos);
        }

        let has_overlays = self.has_overlay();
        let frame = Frame::from(lines).with_cursor(cursor_pos);
        let cursor_pos = frame.cursor();
        let total_lines = frame.lines().len();
        let render_cmds =
            self.renderer
                .render(frame, width, height, self.clear_on_shrink, has_overlays);
        self.output.extend(render_cmds);

        let (updated_row, cursor_cmds) = position_hardware_cursor(
            cursor_pos,
            total_lines,
            self.renderer.hardware_cursor_row(),
            self.show_hardware_cursor,
        );
        self.output.extend(cursor_cmds);
        self.renderer.set_hardware_cursor_row(updated_row);
    }

    fn flush_output(&mut self) {
        if self.output.is_empty() {
            return;
        }
        self.output.flush(&mut self.terminal);
        if self.kitty_enable_pending {
            self.kitty_keyboard_enabled = true;
            self.kitty_enable_pending = false;
        }
    }

    fn place_cursor_at_end(&mut self) {
        let total_lines = self.renderer.previous_lines_len();
        if total_lines == 0 {
            return;
        }
        let target_row = total_lines;
        let current_row = self.renderer.hardware_cursor_row();
        let diff = target_row as i32 - current_row as i32;
        if diff > 0 {
            self.output.push(TerminalCmd::MoveDown(diff as usize));
        } else if diff < 0 {
            self.output.push(TerminalCmd::MoveUp((-diff) as usize));
        }
        self.output.push(TerminalCmd::BytesStatic("\r\n"));
        self.renderer.set_hardware_cursor_row(target_row);
    }

    fn query_cell_size(&mut self) {
        if get_capabilities(self.terminal_image_state.as_ref())
            .images
            .is_none()
        {
            return;
        }
        self.cell_size_query_pending = true;
        self.output.push(TerminalCmd::QueryCellSize);
    }

    fn filter_cell_size_response(&mut self, data: &str) -> Option<String> {
        self.input_buffer.push_str(data);

        if let Some((start, end, height_px, width_px)) = find_cell_size_response(&self.input_buffer)
        {
            if height_px > 0 && width_px > 0 {
                set_cell_dimensions(
                    self.terminal_image_state.as_ref(),
                    CellDimensions {
                        width_px,
                        height_px,
                    },
                );
                {
                    let mut root = self.root.borrow_mut();
                    root.invalidate();
                }
                self.request_render();
            }
            self.input_buffer.replace_range(start..end, "");
            self.cell_size_query_pending = false;
        }

        if self.cell_size_query_pending && is_partial_cell_size(&self.input_buffer) {
            return None;
        }

        let result = self.input_buffer.clone();
        self.input_buffer.clear();
        self.cell_size_query_pending = false;
        Some(result)
    }

    fn composite_overlay_lines(
        &mut self,
        lines: Vec<String>,
        width: usize,
        height: usize,
    ) -> (Vec<String>, Option<CursorPos>) {
        let (overlays, overlay_cursor) = {
            let state = self.overlays.borrow();
            let mut rendered: Vec<(RenderedOverlay, Option<CursorPos>)> = Vec::new();
            for entry in state.entries.iter() {
                if !self.is_overlay_visible(entry) {
                    continue;
                }
                let layout = resolve_overlay_layout(entry.options.as_ref(), 0, width, height);
                let mut component = entry.component.borrow_mut();
                component.set_terminal_rows(height);
                let mut overlay_lines = component.render(layout.width);
                let mut cursor_pos = component.cursor_pos();
                if let Some(max_height) = layout.max_height {
                    if overlay_lines.len() > max_height {
                        overlay_lines.truncate(max_height);
                    }
                }
                if let Some(pos) = cursor_pos {
                    if pos.row >= overlay_lines.len() {
                        cursor_pos = None;
                    }
                }
                let final_layout = resolve_overlay_layout(
                    entry.options.as_ref(),
                    overlay_lines.len(),
                    width,
                    height,
                );
                rendered.push((
                    RenderedOverlay {
                        lines: overlay_lines,
                        row: final_layout.row,
                        col: final_layout.col,
                        width: final_layout.width,
                    },
                    cursor_pos,
                ));
            }

            let mut min_lines_needed = lines.len();
            for (overlay, _) in rendered.iter() {
                min_lines_needed = min_lines_needed.max(overlay.row + overlay.lines.len());
            }
            let working_height = self.renderer.max_lines_rendered().max(min_lines_needed);
            let viewport_start = working_height.saturating_sub(height);

            let mut overlay_cursor: Option<CursorPos> = None;
            for (overlay, cursor_pos) in rendered.iter() {
                let Some(cursor_pos) = cursor_pos else {
                    continue;
                };
                if cursor_pos.row >= overlay.lines.len() || cursor_pos.col >= overlay.width {
                    continue;
                }
                // Never place the hardware cursor onto an image line.
                if is_image_line(&overlay.lines[cursor_pos.row]) {
                    continue;
                }
                let abs_row = viewport_start
                    .saturating_add(overlay.row)
                    .saturating_add(cursor_pos.row);
                if abs_row < lines.len() && is_image_line(&lines[abs_row]) {
                    continue;
                }
                overlay_cursor = Some(CursorPos {
                    row: abs_row,
                    col: overlay.col.saturating_add(cursor_pos.col),
                });
            }

            let overlays = rendered
                .into_iter()
                .map(|(overlay, _)| overlay)
                .collect::<Vec<_>>();
            (overlays, overlay_cursor)
        };

        let composited = composite_overlays(
            lines,
            &overlays,
            width,
            height,
            self.renderer.max_lines_rendered(),
            is_image_line,
        );

        (composited, overlay_cursor)
    }

    fn is_overlay_visible(&self, entry: &OverlayEntry) -> bool {
        if entry.hidden {
            return false;
        }
        match entry.options.as_ref().and_then(|opt| opt.visible.as_ref()) {
            Some(visible) => visible(
                self.terminal.columns() as usize,
                self.terminal.rows() as usize,
            ),
            None => true,
        }
    }

    fn reconcile_focus(&mut self) {
        let focused = self.focus.focused();
        if let Some(focused) = focused {
            if let Some(pre_focus) = self.pre_focus_for_overlay(&focused) {
                if !self.is_overlay_visible_for_component(&focused) {
                    let next = self.topmost_visible_overlay().or(pre_focus);
                    if let Some(next) = next {
                        self.focus.set_focus(Some(next));
                    } else if let Some(restore) = self.take_pending_pre_focus() {
                        self.focus.set_focus(Some(restore));
                    } else {
                        self.focus.clear();
                    }
                }
                return;
            }
        }

        if let Some(topmost) = self.topmost_visible_overlay() {
            self.focus.set_focus(Some(topmost));
        } else if let Some(restore) = self.take_pending_pre_focus() {
            self.focus.set_focus(Some(restore));
        }
    }

    fn topmost_visible_overlay(&self) -> Option<Rc<RefCell<Box<dyn Component>>>> {
        let state = self.overlays.borrow();
        for entry in state.entries.iter().rev() {
            if self.is_overlay_visible(entry) {
                return Some(Rc::clone(&entry.component));
            }
        }
        None
    }

    fn pre_focus_for_overlay(&self, component: &ComponentRc) -> Option<Option<ComponentRc>> {
        let state = self.overlays.borrow();
        state
            .entries
            .iter()
            .find(|entry| Rc::ptr_eq(&entry.component, component))
            .map(|entry| entry.pre_focus.clone())
    }

    fn is_overlay_visible_for_component(&self, component: &ComponentRc) -> bool {
        let state = self.overlays.borrow();
        if let Some(entry) = state
            .entries
            .iter()
            .find(|entry| Rc::ptr_eq(&entry.component, component))
        {
            return self.is_overlay_visible(entry);
        }
        false
    }

    fn take_overlay_dirty(&mut self) -> bool {
        let mut state = self.overlays.borrow_mut();
        let dirty = state.dirty;
        state.dirty = false;
        dirty
    }

    fn peek_overlay_dirty(&self) -> bool {
        let state = self.overlays.borrow();
        state.dirty
    }

    fn has_pending_non_render(&self) -> bool {
        self.peek_overlay_dirty() || self.wake.has_pending_non_render()
    }

    fn take_pending_pre_focus(&mut self) -> Option<Rc<RefCell<Box<dyn Component>>>> {
        let mut state = self.overlays.borrow_mut();
        state.pending_pre_focus.take()
    }
}

impl<T: Terminal> Drop for TuiRuntime<T> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }

        // Best-effort cleanup: never panic in Drop (especially during unwind).
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = self.stop();
        }));
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|value| value == "1").unwrap_or(false)
}

fn find_cell_size_response(buffer: &str) -> Option<(usize, usize, u32, u32)> {
    let bytes = buffer.as_bytes();
    let mut i = 0;
    while i + 4 < bytes.len() {
        if bytes[i] == 0x1b && bytes[i + 1] == b'[' && bytes[i + 2] == b'6' && bytes[i + 3] == b';'
        {
            let mut j = i + 4;
            let mut height: u32 = 0;
            let mut has_height = false;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                height = height
                    .saturating_mul(10)
                    .saturating_add((bytes[j] - b'0') as u32);
                has_height = true;
                j += 1;
            }
            if !has_height || j >= bytes.len() || bytes[j] != b';' {
                i += 1;
                continue;
            }
            j += 1;
            let mut width: u32 = 0;
            let mut has_width = false;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                width = width
                    .saturating_mul(10)
                    .saturating_add((bytes[j] - b'0') as u32);
                has_width = true;
                j += 1;
            }
            if !has_width || j >= bytes.len() || bytes[j] != b't' {
                i += 1;
                continue;
            }
            return Some((i, j + 1, height, width));
        }
        i += 1;
    }
    None
}

fn is_partial_cell_size(buffer: &str) -> bool {
    let Some(start) = buffer.rfind("\x1b[6") else {
        return false;
    };
    let tail = &buffer[start..];
    if tail.contains('t') {
        return false;
    }
    tail.chars()
        .all(|ch| ch == '\x1b' || ch == '[' || ch == '6' || ch == ';' || ch.is_ascii_digit())
}
