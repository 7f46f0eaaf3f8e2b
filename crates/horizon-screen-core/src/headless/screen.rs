use std::collections::{HashMap, VecDeque};

use parking_lot::{Condvar, Mutex};

use crate::error::{NativeError, NativeResult};
use crate::geometry::{Point, Rect, Size};
use crate::logging::targets;
use crate::native::{
    BufferHandle, BufferInfo, DisplayHandle, DisplayInfo, GroupName, NativeEvent, NativeMessage,
    NativeWindowInfo, NativeWindowType, PixelFormat, Pulse, ScreenApi, Sensitivity, Transparency,
    Usage, WindowHandle, WindowProperty,
};

// errno-style codes reported by failing calls
const EEXIST: i32 = 17;
const ENOENT: i32 = 2;
const EINVAL: i32 = 22;

/// One post of a render buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub buffer: BufferHandle,
    pub dirty: Vec<Rect>,
}

/// Everything the headless compositor knows about a window.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub kind: NativeWindowType,
    /// Created through [`HeadlessScreen::create_foreign_window`].
    pub foreign: bool,
    pub position: Point,
    pub size: Size,
    pub source_size: Size,
    pub buffer_size: Size,
    pub format: Option<PixelFormat>,
    pub transparency: Transparency,
    pub swap_interval: i32,
    pub zorder: i32,
    pub visible: bool,
    pub global_alpha: i32,
    pub rotation: i32,
    pub sensitivity: Sensitivity,
    pub usage: Option<Usage>,
    pub display: Option<DisplayHandle>,
    pub id_string: Option<String>,
    /// Group created by this window.
    pub owned_group: Option<GroupName>,
    /// Group this window has joined.
    pub joined_group: Option<GroupName>,
    pub focused: bool,
    pub buffers: Vec<BufferHandle>,
    pub posts: Vec<PostRecord>,
}

impl HeadlessWindow {
    fn new(kind: NativeWindowType) -> Self {
        Self {
            kind,
            foreign: false,
            position: Point::ZERO,
            size: Size::ZERO,
            source_size: Size::ZERO,
            buffer_size: Size::ZERO,
            format: None,
            transparency: Transparency::None,
            swap_interval: 1,
            zorder: 0,
            visible: true,
            global_alpha: 255,
            rotation: 0,
            sensitivity: Sensitivity::Always,
            usage: None,
            display: None,
            id_string: None,
            owned_group: None,
            joined_group: None,
            focused: false,
            buffers: Vec::new(),
            posts: Vec::new(),
        }
    }
}

/// Call counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessStats {
    pub windows_created: usize,
    pub windows_destroyed: usize,
    pub buffers_created: usize,
    pub buffers_destroyed: usize,
    pub posts: usize,
    pub blits: usize,
    pub context_flushes: usize,
    /// Every `(owner, target)` pair passed to `set_group_focus`, in order.
    pub focus_grants: Vec<(WindowHandle, WindowHandle)>,
}

struct BufferState {
    window: WindowHandle,
    info: BufferInfo,
    memory: Vec<u8>,
}

struct State {
    next_id: u64,
    windows: HashMap<WindowHandle, HeadlessWindow>,
    buffers: HashMap<BufferHandle, BufferState>,
    displays: Vec<DisplayInfo>,
    groups: HashMap<GroupName, WindowHandle>,
    queue: VecDeque<NativeMessage>,
    stats: HeadlessStats,
    buffer_count_override: Option<usize>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn window_mut(&mut self, window: WindowHandle) -> NativeResult<&mut HeadlessWindow> {
        self.windows.get_mut(&window).ok_or(NativeError::InvalidHandle)
    }

    fn display_mut(&mut self, display: DisplayHandle) -> NativeResult<&mut DisplayInfo> {
        self.displays
            .iter_mut()
            .find(|d| d.id == display)
            .ok_or(NativeError::InvalidHandle)
    }
}

/// An in-memory compositor.
pub struct HeadlessScreen {
    state: Mutex<State>,
    queue_ready: Condvar,
}

impl HeadlessScreen {
    /// A compositor with one attached 1024x768 display.
    pub fn new() -> Self {
        let screen = Self::without_displays();
        screen.add_display(Size::new(1024, 768), true);
        screen
    }

    /// A compositor that reports no displays.
    pub fn without_displays() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 0,
                windows: HashMap::new(),
                buffers: HashMap::new(),
                displays: Vec::new(),
                groups: HashMap::new(),
                queue: VecDeque::new(),
                stats: HeadlessStats::default(),
                buffer_count_override: None,
            }),
            queue_ready: Condvar::new(),
        }
    }

    /// Register a display. The first one registered is the primary.
    pub fn add_display(&self, size: Size, attached: bool) -> DisplayHandle {
        let mut state = self.state.lock();
        let id = DisplayHandle::from_raw(state.next_id());
        state.displays.push(DisplayInfo {
            id,
            size,
            physical_size: Size::new(203, 152),
            rotation: 0,
            attached,
            refresh_rate: Some(60),
        });
        id
    }

    /// Edit a display's information in place.
    pub fn update_display(&self, display: DisplayHandle, f: impl FnOnce(&mut DisplayInfo)) {
        if let Ok(info) = self.state.lock().display_mut(display) {
            f(info);
        }
    }

    /// Mark a display attached or detached and queue the notification.
    pub fn set_display_attached(&self, display: DisplayHandle, attached: bool) {
        self.update_display(display, |info| info.attached = attached);
        self.push_event(NativeEvent::Display { display, attached });
    }

    /// Queue an event as if the compositor emitted it.
    pub fn push_event(&self, event: NativeEvent) {
        let mut state = self.state.lock();
        state.queue.push_back(NativeMessage::Event(event));
        self.queue_ready.notify_one();
    }

    /// Number of queued messages not yet received.
    pub fn pending_messages(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Create a window as another process would, and queue its create event.
    pub fn create_foreign_window(
        &self,
        display: DisplayHandle,
        id_string: Option<&str>,
    ) -> WindowHandle {
        let handle = {
            let mut state = self.state.lock();
            let handle = WindowHandle::from_raw(state.next_id());
            let mut window = HeadlessWindow::new(NativeWindowType::Application);
            window.foreign = true;
            window.display = Some(display);
            window.id_string = id_string.map(str::to_owned);
            state.windows.insert(handle, window);
            handle
        };
        self.push_event(NativeEvent::Create { window: handle });
        handle
    }

    /// Remove a foreign window and queue its close event.
    pub fn close_foreign_window(&self, window: WindowHandle) {
        self.state.lock().windows.remove(&window);
        self.push_event(NativeEvent::Close { window });
    }

    /// Set the focus flag reported by `window_info`.
    pub fn set_focused(&self, window: WindowHandle, focused: bool) {
        if let Ok(w) = self.state.lock().window_mut(window) {
            w.focused = focused;
        }
    }

    /// Make `create_window_buffers` produce this many buffers regardless of
    /// the requested count.
    pub fn force_buffer_count(&self, count: Option<usize>) {
        self.state.lock().buffer_count_override = count;
    }

    pub fn window_snapshot(&self, window: WindowHandle) -> Option<HeadlessWindow> {
        self.state.lock().windows.get(&window).cloned()
    }

    pub fn window_handles(&self) -> Vec<WindowHandle> {
        let mut handles: Vec<_> = self.state.lock().windows.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn stats(&self) -> HeadlessStats {
        self.state.lock().stats.clone()
    }

    /// Copy out a buffer's bytes.
    pub fn buffer_bytes(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).map(|b| b.memory.clone())
    }
}

impl Default for HeadlessScreen {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_rect(
    dst: &mut [u8],
    dst_info: &BufferInfo,
    src: &[u8],
    src_info: &BufferInfo,
    src_rect: Rect,
    dst_rect: Rect,
) {
    let bpp = dst_info.format.bytes_per_pixel();
    let Some(src_rect) = src_rect.intersection(&Rect::from_size(src_info.size)) else {
        return;
    };
    let width = src_rect.width.min(dst_rect.width);
    let height = src_rect.height.min(dst_rect.height);
    for row in 0..height {
        let sy = src_rect.y + row;
        let dy = dst_rect.y + row;
        if dy < 0 || dy >= dst_info.size.height {
            continue;
        }
        for col in 0..width {
            let sx = src_rect.x + col;
            let dx = dst_rect.x + col;
            if dx < 0 || dx >= dst_info.size.width {
                continue;
            }
            let s = sy as usize * src_info.stride + sx as usize * bpp;
            let d = dy as usize * dst_info.stride + dx as usize * bpp;
            dst[d..d + bpp].copy_from_slice(&src[s..s + bpp]);
        }
    }
}

impl ScreenApi for HeadlessScreen {
    fn displays(&self) -> NativeResult<Vec<DisplayHandle>> {
        Ok(self.state.lock().displays.iter().map(|d| d.id).collect())
    }

    fn display_info(&self, display: DisplayHandle) -> NativeResult<DisplayInfo> {
        self.state
            .lock()
            .displays
            .iter()
            .find(|d| d.id == display)
            .cloned()
            .ok_or(NativeError::InvalidHandle)
    }

    fn create_window(&self, kind: NativeWindowType) -> NativeResult<WindowHandle> {
        let mut state = self.state.lock();
        let handle = WindowHandle::from_raw(state.next_id());
        state.windows.insert(handle, HeadlessWindow::new(kind));
        state.stats.windows_created += 1;
        tracing::trace!(target: targets::HEADLESS, %handle, ?kind, "window created");
        Ok(handle)
    }

    fn destroy_window(&self, window: WindowHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        let removed = state.windows.remove(&window).ok_or(NativeError::InvalidHandle)?;
        for buffer in &removed.buffers {
            state.buffers.remove(buffer);
        }
        if let Some(group) = &removed.owned_group {
            state.groups.remove(group);
        }
        state.stats.windows_destroyed += 1;
        Ok(())
    }

    fn set_window_property(
        &self,
        window: WindowHandle,
        value: WindowProperty,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        let w = state.window_mut(window)?;
        match value {
            WindowProperty::Position(p) => w.position = p,
            WindowProperty::Size(s) => w.size = s,
            WindowProperty::SourceSize(s) => w.source_size = s,
            WindowProperty::BufferSize(s) => {
                if s.is_empty() {
                    return Err(NativeError::call("set buffer size", EINVAL));
                }
                w.buffer_size = s;
            }
            WindowProperty::Format(f) => w.format = Some(f),
            WindowProperty::Transparency(t) => w.transparency = t,
            WindowProperty::SwapInterval(i) => w.swap_interval = i,
            WindowProperty::ZOrder(z) => w.zorder = z,
            WindowProperty::Visible(v) => w.visible = v,
            WindowProperty::GlobalAlpha(a) => w.global_alpha = a,
            WindowProperty::Rotation(r) => w.rotation = r,
            WindowProperty::Sensitivity(s) => w.sensitivity = s,
            WindowProperty::Usage(u) => w.usage = Some(u),
            WindowProperty::Display(d) => w.display = Some(d),
            WindowProperty::IdString(s) => w.id_string = Some(s),
        }
        Ok(())
    }

    fn window_info(&self, window: WindowHandle) -> NativeResult<NativeWindowInfo> {
        let state = self.state.lock();
        let w = state.windows.get(&window).ok_or(NativeError::InvalidHandle)?;
        Ok(NativeWindowInfo {
            position: w.position,
            size: w.size,
            display: w.display,
            id_string: w.id_string.clone(),
            focused: w.focused,
            visible: w.visible,
            buffer_count: w.buffers.len(),
        })
    }

    fn create_window_group(&self, window: WindowHandle) -> NativeResult<GroupName> {
        let mut state = self.state.lock();
        let w = state.window_mut(window)?;
        if w.owned_group.is_some() {
            return Err(NativeError::call("create window group", EEXIST));
        }
        let name = GroupName::new(format!("group-{}", window.as_raw()));
        w.owned_group = Some(name.clone());
        state.groups.insert(name.clone(), window);
        Ok(name)
    }

    fn join_window_group(&self, window: WindowHandle, group: &GroupName) -> NativeResult<()> {
        let mut state = self.state.lock();
        if !state.groups.contains_key(group) {
            return Err(NativeError::call("join window group", ENOENT));
        }
        state.window_mut(window)?.joined_group = Some(group.clone());
        Ok(())
    }

    fn leave_window_group(&self, window: WindowHandle) -> NativeResult<()> {
        self.state.lock().window_mut(window)?.joined_group = None;
        Ok(())
    }

    fn set_group_focus(&self, owner: WindowHandle, target: WindowHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        let group = state
            .windows
            .get(&owner)
            .ok_or(NativeError::InvalidHandle)?
            .owned_group
            .clone()
            .ok_or(NativeError::call("set group focus", ENOENT))?;
        let target_ok = target == owner
            || state
                .windows
                .get(&target)
                .ok_or(NativeError::InvalidHandle)?
                .joined_group
                .as_ref()
                == Some(&group);
        if !target_ok {
            return Err(NativeError::call("set group focus", EINVAL));
        }
        for w in state.windows.values_mut() {
            if w.joined_group.as_ref() == Some(&group) {
                w.focused = false;
            }
        }
        state.window_mut(target)?.focused = true;
        state.stats.focus_grants.push((owner, target));
        Ok(())
    }

    fn create_window_buffers(&self, window: WindowHandle, count: usize) -> NativeResult<()> {
        let mut state = self.state.lock();
        let count = state.buffer_count_override.unwrap_or(count);
        let (size, format) = {
            let w = state.window_mut(window)?;
            if !w.buffers.is_empty() {
                return Err(NativeError::call("create window buffers", EEXIST));
            }
            let format = w
                .format
                .ok_or(NativeError::call("create window buffers", EINVAL))?;
            (w.buffer_size.non_empty(), format)
        };
        let stride = size.width as usize * format.bytes_per_pixel();
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let handle = BufferHandle::from_raw(state.next_id());
            state.buffers.insert(
                handle,
                BufferState {
                    window,
                    info: BufferInfo {
                        size,
                        stride,
                        format,
                    },
                    memory: vec![0; stride * size.height as usize],
                },
            );
            handles.push(handle);
        }
        state.stats.buffers_created += handles.len();
        state.window_mut(window)?.buffers = handles;
        Ok(())
    }

    fn destroy_window_buffers(&self, window: WindowHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        let buffers = std::mem::take(&mut state.window_mut(window)?.buffers);
        for buffer in &buffers {
            state.buffers.remove(buffer);
        }
        state.stats.buffers_destroyed += buffers.len();
        Ok(())
    }

    fn render_buffers(&self, window: WindowHandle) -> NativeResult<Vec<BufferHandle>> {
        let state = self.state.lock();
        Ok(state
            .windows
            .get(&window)
            .ok_or(NativeError::InvalidHandle)?
            .buffers
            .clone())
    }

    fn buffer_info(&self, buffer: BufferHandle) -> NativeResult<BufferInfo> {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map(|b| b.info)
            .ok_or(NativeError::InvalidHandle)
    }

    fn with_buffer_memory(
        &self,
        buffer: BufferHandle,
        f: &mut dyn FnMut(&mut [u8]),
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        let b = state.buffers.get_mut(&buffer).ok_or(NativeError::InvalidHandle)?;
        f(&mut b.memory);
        Ok(())
    }

    fn blit(
        &self,
        dst: BufferHandle,
        src: BufferHandle,
        src_rect: Rect,
        dst_rect: Rect,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        let (src_bytes, src_info) = {
            let s = state.buffers.get(&src).ok_or(NativeError::InvalidHandle)?;
            (s.memory.clone(), s.info)
        };
        let d = state.buffers.get_mut(&dst).ok_or(NativeError::InvalidHandle)?;
        if d.info.format != src_info.format {
            return Err(NativeError::call("blit", EINVAL));
        }
        let dst_info = d.info;
        copy_rect(&mut d.memory, &dst_info, &src_bytes, &src_info, src_rect, dst_rect);
        state.stats.blits += 1;
        Ok(())
    }

    fn flush_blits(&self) -> NativeResult<()> {
        Ok(())
    }

    fn post_window(
        &self,
        window: WindowHandle,
        buffer: BufferHandle,
        dirty: &[Rect],
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        match state.buffers.get(&buffer) {
            Some(b) if b.window == window => {}
            Some(_) => return Err(NativeError::BadArgument("buffer belongs to another window")),
            None => return Err(NativeError::InvalidHandle),
        }
        state.window_mut(window)?.posts.push(PostRecord {
            buffer,
            dirty: dirty.to_vec(),
        });
        state.stats.posts += 1;
        Ok(())
    }

    fn flush_context(&self) -> NativeResult<()> {
        self.state.lock().stats.context_flushes += 1;
        Ok(())
    }

    fn receive(&self) -> NativeResult<NativeMessage> {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.queue.pop_front() {
                return Ok(message);
            }
            self.queue_ready.wait(&mut state);
        }
    }

    fn send_pulse(&self, pulse: Pulse) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.queue.push_back(NativeMessage::Pulse(pulse));
        self.queue_ready.notify_one();
        Ok(())
    }
}

static_assertions::assert_impl_all!(HeadlessScreen: Send, Sync);
