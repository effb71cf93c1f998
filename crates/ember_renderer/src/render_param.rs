//! Host-side handle pairing a renderer with its render thread.
//!
//! Scene edits must never overlap a render. `RenderParam::acquire_scene_for_edit`
//! stops the render first and hands back a guard through which the renderer
//! (its lights, camera, AOVs and scene) may be changed. Restart rendering
//! with `start_render` once the guard is dropped.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::render_thread::RenderThread;
use crate::renderer::Renderer;

/// Owns the render thread driving one `Renderer`.
pub struct RenderParam {
    renderer: Arc<Renderer>,
    thread: RenderThread,
    edit_lock: Mutex<()>,
    scene_version: AtomicU64,
}

/// Exclusive edit access to the renderer while no render is running.
pub struct SceneEdit<'a> {
    renderer: &'a Renderer,
    _guard: MutexGuard<'a, ()>,
}

impl Deref for SceneEdit<'_> {
    type Target = Renderer;

    fn deref(&self) -> &Renderer {
        self.renderer
    }
}

impl RenderParam {
    /// Start a render thread whose callback renders with `renderer`.
    pub fn new(renderer: Arc<Renderer>) -> Self {
        let thread = RenderThread::new();
        let r = renderer.clone();
        thread.set_render_callback(move |control| r.render(control));
        thread.start_thread();

        Self {
            renderer,
            thread,
            edit_lock: Mutex::new(()),
            scene_version: AtomicU64::new(0),
        }
    }

    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    pub fn render_thread(&self) -> &RenderThread {
        &self.thread
    }

    /// Stop any render in flight and return edit access to the renderer.
    ///
    /// Each call bumps the scene version. Editors are serialized against
    /// each other; the render stays stopped until `start_render`.
    pub fn acquire_scene_for_edit(&self) -> SceneEdit<'_> {
        let guard = self
            .edit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.thread.stop_render();
        self.scene_version.fetch_add(1, Ordering::AcqRel);

        SceneEdit {
            renderer: &self.renderer,
            _guard: guard,
        }
    }

    /// Incremented by every `acquire_scene_for_edit`.
    pub fn scene_version(&self) -> u64 {
        self.scene_version.load(Ordering::Acquire)
    }

    /// Clear the AOV buffers and start a fresh render.
    pub fn start_render(&self) {
        self.thread.stop_render();
        self.renderer.clear();
        self.renderer.mark_aov_buffers_unconverged();
        log::debug!("Starting render at scene version {}", self.scene_version());
        self.thread.start_render();
    }

    pub fn stop_render(&self) {
        self.thread.stop_render();
    }

    pub fn is_rendering(&self) -> bool {
        self.thread.is_rendering()
    }

    pub fn pause_render(&self) {
        self.thread.pause_render();
    }

    pub fn resume_render(&self) {
        self.thread.resume_render();
    }
}
