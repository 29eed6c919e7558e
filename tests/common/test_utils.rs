use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use roadscape::{
    builder::{SceneState, assemble_scene},
    data_structures::scene_graph::TextureId,
    frame::{DisplaySurface, FrameRenderer},
    layout::SceneLayout,
    resources::{AssetFuture, AssetSource},
};

/// In-memory asset source recording every fetch in order.
#[derive(Default)]
pub struct MockSource {
    files: HashMap<String, Vec<u8>>,
    missing: HashSet<String>,
    /// Path -> number of fetches that still fail before it succeeds.
    flaky: Mutex<HashMap<String, u32>>,
    log: Mutex<Vec<String>>,
    backoffs: Mutex<Vec<Duration>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    pub fn with_missing(mut self, path: &str) -> Self {
        self.missing.insert(path.to_string());
        self
    }

    pub fn failing_first(self, path: &str, failures: u32) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(path.to_string(), failures);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Delays asked for between retries, in order. No time actually passes.
    pub fn backoffs(&self) -> Vec<Duration> {
        self.backoffs.lock().unwrap().clone()
    }
}

impl AssetSource for MockSource {
    fn fetch(&self, path: &str) -> AssetFuture<anyhow::Result<Vec<u8>>> {
        self.log.lock().unwrap().push(path.to_string());
        let flaky = {
            let mut flaky = self.flaky.lock().unwrap();
            match flaky.get_mut(path) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        let result = if flaky {
            Err(anyhow::anyhow!("{} temporarily unavailable", path))
        } else if self.missing.contains(path) {
            Err(anyhow::anyhow!("{} not found", path))
        } else {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} not found", path))
        };
        Box::pin(async move { result })
    }

    fn backoff(&self, delay: Duration) -> AssetFuture<()> {
        self.backoffs.lock().unwrap().push(delay);
        Box::pin(async {})
    }
}

pub const CUBE_MTL: &str = "newmtl paint\nKd 0.8 0.1 0.1\n";

pub const CUBE_OBJ: &str = "mtllib cube.mtl
o cube
usemtl paint
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
f 1 2 3 4
f 6 5 8 7
f 4 3 7 8
f 5 6 2 1
f 2 6 7 3
f 5 1 4 8
";

/// Records what each frame saw instead of drawing it.
#[derive(Debug, Default)]
pub struct MockBackend {
    pub displayed: (u32, u32),
    pub buffer: (u32, u32),
    pub resizes: Vec<(u32, u32)>,
    pub frames: Vec<FrameRecord>,
    pub fail_every_render: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub mesh_count: usize,
    pub aspect: f32,
    pub environment: Option<TextureId>,
}

impl MockBackend {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            displayed: (width, height),
            buffer: (width, height),
            ..Default::default()
        }
    }
}

impl DisplaySurface for MockBackend {
    fn displayed_size(&self) -> (u32, u32) {
        self.displayed
    }

    fn buffer_size(&self) -> (u32, u32) {
        self.buffer
    }

    fn resize_buffer(&mut self, width: u32, height: u32) {
        self.buffer = (width, height);
        self.resizes.push((width, height));
    }
}

impl FrameRenderer for MockBackend {
    fn render(&mut self, scene: &SceneState) -> anyhow::Result<()> {
        self.frames.push(FrameRecord {
            mesh_count: scene.graph.mesh_count(),
            aspect: scene.camera.aspect,
            environment: scene.graph.environment(),
        });
        if self.fail_every_render {
            anyhow::bail!("device lost");
        }
        Ok(())
    }
}

/// The default scene with placeholder textures, nothing fetched.
pub fn default_scene() -> SceneState {
    assemble_scene(&SceneLayout::default(), &HashMap::new(), 800.0 / 600.0)
        .expect("default layout is valid")
}
