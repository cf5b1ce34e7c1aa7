//! Filesystem asset pipeline
//!
//! Reads `<root>/<package>/<asset_name>` and decodes it by [`AssetKind`].
//! Asynchronous requests are decoded on worker threads; their results wait in
//! a channel until the owning thread calls `poll_events`, so completions are
//! always delivered on the thread that owns the registry. Synchronous requests
//! are decoded inline.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::FxHashMap;

use crate::core::RegistryConfig;

use super::data::{AssetData, AudioData, ImageData, MeshData};
use super::descriptor::{AssetDescriptor, AssetKind};
use super::pipeline::{
    AssetCompletion, AssetError, AssetEvent, AssetPipeline, AssetRequest, ImportParams, WatchId,
};

/// Work item sent to a decoder thread
struct Job {
    request: AssetRequest,
    path: PathBuf,
}

/// Decoder thread output
struct JobResult {
    request: AssetRequest,
    path: PathBuf,
    result: Result<AssetData, AssetError>,
}

/// A watched file and the modification time of its last delivered version
#[derive(Debug)]
struct Watch {
    path: PathBuf,
    descriptor: AssetDescriptor,
    params: ImportParams,
    modified: Option<SystemTime>,
}

/// Pipeline reading assets from disk
pub struct FileAssetPipeline {
    root: PathBuf,
    default_package: String,
    /// Job queue feeding the workers; dropped on shutdown
    job_sender: Option<Sender<Job>>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    synchronous_ready: Vec<AssetEvent>,
    watches: FxHashMap<WatchId, Watch>,
    next_watch_id: u32,
    /// Outstanding references per loaded file
    references: FxHashMap<PathBuf, u32>,
    /// Asynchronous requests submitted but not yet delivered
    pending: usize,
}

impl FileAssetPipeline {
    /// Create a pipeline rooted at `config.asset_root` with
    /// `config.worker_threads` decoder threads (at least one).
    #[must_use]
    pub fn new(config: &RegistryConfig) -> Self {
        let (job_sender, job_receiver) = crossbeam_channel::unbounded::<Job>();
        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<JobResult>();

        let worker_count = config.worker_threads.max(1);
        let workers = (0..worker_count)
            .filter_map(|index| {
                let jobs = job_receiver.clone();
                let results = result_sender.clone();
                std::thread::Builder::new()
                    .name(format!("asset-worker-{index}"))
                    .spawn(move || {
                        for job in jobs.iter() {
                            let result = decode_file(
                                &job.path,
                                job.request.descriptor.kind,
                                job.request.params,
                            );
                            let output = JobResult {
                                request: job.request,
                                path: job.path,
                                result,
                            };
                            if results.send(output).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| log::error!("Failed to spawn asset worker {index}: {e}"))
                    .ok()
            })
            .collect::<Vec<_>>();

        log::info!(
            "File asset pipeline rooted at {} with {} workers",
            config.asset_root.display(),
            workers.len()
        );

        Self {
            root: config.asset_root.clone(),
            default_package: config.default_package.clone(),
            job_sender: Some(job_sender),
            result_receiver,
            workers,
            synchronous_ready: Vec::new(),
            watches: FxHashMap::default(),
            next_watch_id: 0,
            references: FxHashMap::default(),
            pending: 0,
        }
    }

    /// Path an asset resolves to
    #[must_use]
    pub fn resolve_path(&self, descriptor: &AssetDescriptor) -> PathBuf {
        self.root
            .join(descriptor.package_or(&self.default_package))
            .join(&descriptor.asset_name)
    }

    /// Asynchronous requests not yet delivered
    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.pending
    }

    fn complete(
        &mut self,
        request: AssetRequest,
        path: PathBuf,
        result: Result<AssetData, AssetError>,
    ) -> AssetEvent {
        let mut watch_id = None;
        if result.is_ok() {
            *self.references.entry(path.clone()).or_insert(0) += 1;
            if request.descriptor.watch {
                let id = WatchId(self.next_watch_id);
                self.next_watch_id += 1;
                self.watches.insert(
                    id,
                    Watch {
                        modified: modified_time(&path),
                        path,
                        descriptor: request.descriptor.clone(),
                        params: request.params,
                    },
                );
                watch_id = Some(id);
            }
        } else if let Err(e) = &result {
            log::debug!("Asset {} failed: {e}", request.descriptor);
        }

        AssetEvent::Completed(AssetCompletion {
            context: request.context,
            descriptor: request.descriptor,
            result,
            watch_id,
        })
    }

    fn scan_watches(&mut self, events: &mut Vec<AssetEvent>) {
        for (watch_id, watch) in &mut self.watches {
            let modified = modified_time(&watch.path);
            if modified.is_none() || modified == watch.modified {
                continue;
            }
            watch.modified = modified;

            match decode_file(&watch.path, watch.descriptor.kind, watch.params) {
                Ok(data) => {
                    log::info!("Watched asset changed: {}", watch.descriptor);
                    events.push(AssetEvent::Changed {
                        watch_id: *watch_id,
                        descriptor: watch.descriptor.clone(),
                        data,
                    });
                }
                Err(e) => log::warn!("Watched asset {} changed but failed to decode: {e}", watch.descriptor),
            }
        }
    }
}

impl AssetPipeline for FileAssetPipeline {
    fn request_asset(&mut self, request: AssetRequest) {
        let path = self.resolve_path(&request.descriptor);

        if request.synchronous {
            let result = decode_file(&path, request.descriptor.kind, request.params);
            let event = self.complete(request, path, result);
            self.synchronous_ready.push(event);
            return;
        }

        let Some(sender) = &self.job_sender else {
            let result = Err(AssetError::IoError("pipeline is shut down".into()));
            let event = self.complete(request, path, result);
            self.synchronous_ready.push(event);
            return;
        };

        if let Err(e) = sender.send(Job { request, path }) {
            // No worker left; decode inline so the request still completes once
            let Job { request, path } = e.into_inner();
            log::warn!("Asset workers unavailable, decoding {} inline", request.descriptor);
            let result = decode_file(&path, request.descriptor.kind, request.params);
            let event = self.complete(request, path, result);
            self.synchronous_ready.push(event);
            return;
        }
        self.pending += 1;
    }

    fn poll_events(&mut self, events: &mut Vec<AssetEvent>) {
        events.append(&mut self.synchronous_ready);

        let finished: Vec<JobResult> = self.result_receiver.try_iter().collect();
        for JobResult {
            request,
            path,
            result,
        } in finished
        {
            self.pending = self.pending.saturating_sub(1);
            let event = self.complete(request, path, result);
            events.push(event);
        }

        self.scan_watches(events);
    }

    fn drain_synchronous(&mut self, events: &mut Vec<AssetEvent>) {
        events.append(&mut self.synchronous_ready);
    }

    fn release_asset(&mut self, asset_name: &str, package_name: &str) {
        let package = if package_name.is_empty() {
            self.default_package.as_str()
        } else {
            package_name
        };
        let path = self.root.join(package).join(asset_name);

        if let Some(count) = self.references.get_mut(&path) {
            *count -= 1;
            if *count == 0 {
                self.references.remove(&path);
            }
        }
    }

    fn unwatch(&mut self, watch_id: WatchId) {
        self.watches.remove(&watch_id);
    }

    fn default_package(&self) -> &str {
        &self.default_package
    }
}

impl Drop for FileAssetPipeline {
    fn drop(&mut self) {
        // Closing the job queue ends every worker loop
        self.job_sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Asset worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for FileAssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAssetPipeline")
            .field("root", &self.root)
            .field("workers", &self.workers.len())
            .field("pending", &self.pending)
            .field("watches", &self.watches.len())
            .finish()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Read and decode one file
fn decode_file(path: &Path, kind: AssetKind, params: ImportParams) -> Result<AssetData, AssetError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
        _ => AssetError::IoError(format!("{}: {e}", path.display())),
    })?;
    decode_bytes(bytes, kind, params)
}

/// Decode raw file contents
pub(crate) fn decode_bytes(
    bytes: Vec<u8>,
    kind: AssetKind,
    params: ImportParams,
) -> Result<AssetData, AssetError> {
    match kind {
        AssetKind::Text => String::from_utf8(bytes)
            .map(AssetData::Text)
            .map_err(|e| AssetError::DecodeError(e.to_string())),
        AssetKind::Binary => Ok(AssetData::Binary(bytes)),
        AssetKind::Image => {
            let mut img = image::load_from_memory(&bytes)
                .map_err(|e| AssetError::DecodeError(e.to_string()))?;
            if params.flip_y {
                img = img.flipv();
            }
            let rgba = img.to_rgba8();
            Ok(AssetData::Image(ImageData {
                width: rgba.width(),
                height: rgba.height(),
                pixels: rgba.into_raw(),
            }))
        }
        AssetKind::StaticMesh => {
            let text =
                String::from_utf8(bytes).map_err(|e| AssetError::DecodeError(e.to_string()))?;
            let mesh: MeshData =
                ron::from_str(&text).map_err(|e| AssetError::DecodeError(e.to_string()))?;
            Ok(AssetData::StaticMesh(mesh))
        }
        AssetKind::Audio => decode_wav(bytes).map(AssetData::Audio),
    }
}

fn decode_wav(bytes: Vec<u8>) -> Result<AudioData, AssetError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AssetError::DecodeError(e.to_string()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AssetError::DecodeError(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AssetError::DecodeError(e.to_string()))?
        }
    };

    Ok(AudioData {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::assets::{AssetContext, Vertex};
    use crate::storage::Handle;

    fn config(root: &Path) -> RegistryConfig {
        RegistryConfig::default()
            .with_asset_root(root)
            .with_worker_threads(1)
    }

    fn request(name: &str, kind: AssetKind, synchronous: bool) -> AssetRequest {
        AssetRequest {
            descriptor: AssetDescriptor::new(name, kind),
            synchronous,
            params: ImportParams::default(),
            context: AssetContext {
                listener: Handle::INVALID,
                position: 0,
            },
        }
    }

    fn write_asset(root: &Path, name: &str, bytes: &[u8]) {
        let dir = root.join("runtime");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
    }

    fn poll_until(pipeline: &mut FileAssetPipeline, count: usize) -> Vec<AssetEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            pipeline.poll_events(&mut events);
            std::thread::sleep(Duration::from_millis(5));
        }
        events
    }

    fn result(event: &AssetEvent) -> &Result<AssetData, AssetError> {
        match event {
            AssetEvent::Completed(completion) => &completion.result,
            AssetEvent::Changed { .. } => panic!("expected a completion"),
        }
    }

    #[test]
    fn test_synchronous_text() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "hello.txt", b"hello world");

        let mut pipeline = FileAssetPipeline::new(&config(dir.path()));
        pipeline.request_asset(request("hello.txt", AssetKind::Text, true));

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        assert_eq!(result(&events[0]), &Ok(AssetData::Text("hello world".into())));
    }

    #[test]
    fn test_async_binary_arrives_on_poll() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "blob.bin", &[1, 2, 3]);

        let mut pipeline = FileAssetPipeline::new(&config(dir.path()));
        pipeline.request_asset(request("blob.bin", AssetKind::Binary, false));
        assert_eq!(pipeline.pending_count(), 1);

        let events = poll_until(&mut pipeline, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(result(&events[0]), &Ok(AssetData::Binary(vec![1, 2, 3])));
        assert_eq!(pipeline.pending_count(), 0);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = FileAssetPipeline::new(&config(dir.path()));

        pipeline.request_asset(request("nope.txt", AssetKind::Text, true));
        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        assert!(matches!(result(&events[0]), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_png_decodes_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let png_dir = dir.path().join("runtime");
        fs::create_dir_all(&png_dir).unwrap();
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .save(png_dir.join("tile.png"))
            .unwrap();

        let mut pipeline = FileAssetPipeline::new(&config(dir.path()));
        pipeline.request_asset(request("tile.png", AssetKind::Image, true));

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        let Ok(AssetData::Image(image)) = result(&events[0]) else {
            panic!("expected an image");
        };
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(&image.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_mesh_ron() {
        let mesh = MeshData {
            vertices: vec![Vertex::new([0.0, 1.0, 2.0], [0.0, 1.0, 0.0], [0.5, 0.5])],
            indices: vec![0, 0, 0],
        };
        let text = ron::to_string(&mesh).unwrap();

        let decoded =
            decode_bytes(text.into_bytes(), AssetKind::StaticMesh, ImportParams::default());
        assert_eq!(decoded, Ok(AssetData::StaticMesh(mesh)));
    }

    #[test]
    fn test_wav_int_samples_normalised() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0_i16).unwrap();
            writer.write_sample(16_384_i16).unwrap();
            writer.finalize().unwrap();
        }

        let decoded =
            decode_bytes(cursor.into_inner(), AssetKind::Audio, ImportParams::default()).unwrap();
        let AssetData::Audio(audio) = decoded else {
            panic!("expected audio");
        };
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.sample_rate, 8_000);
        assert_eq!(audio.samples, vec![0.0, 0.5]);
    }

    #[test]
    fn test_release_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "a.txt", b"a");

        let mut pipeline = FileAssetPipeline::new(&config(dir.path()));
        pipeline.request_asset(request("a.txt", AssetKind::Text, true));
        let path = pipeline.resolve_path(&AssetDescriptor::new("a.txt", AssetKind::Text));
        assert_eq!(pipeline.references.get(&path), Some(&1));

        pipeline.release_asset("a.txt", "");
        assert!(pipeline.references.get(&path).is_none());
    }

    #[test]
    fn test_rewritten_watched_file_hot_reloads() {
        use crate::resources::handlers::Text;
        use crate::resources::{RequestInfo, ResourceRegistry, ResourceType};

        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), "notes.txt", b"first");
        let pipeline = FileAssetPipeline::new(&config(dir.path()));
        let mut registry = ResourceRegistry::with_builtin_handlers(config(dir.path()), pipeline).unwrap();

        let info = RequestInfo::new().with_asset(AssetDescriptor::new("notes.txt", AssetKind::Text).watched());
        let notes = registry.request("notes", ResourceType::Text, info).unwrap();
        assert_eq!(registry.generation(notes), Some(1));
        assert_eq!(registry.update(), 0, "Unchanged file reports nothing");

        write_asset(dir.path(), "notes.txt", b"second");
        let path = registry
            .pipeline()
            .resolve_path(&AssetDescriptor::new("notes.txt", AssetKind::Text));
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        assert_eq!(registry.update(), 1);
        assert_eq!(registry.generation(notes), Some(2));
        assert_eq!(
            registry.payload::<Text>(notes).map(|text| text.content.as_str()),
            Some("second")
        );
        assert_eq!(registry.update(), 0);

        registry.release(notes);
        assert_eq!(registry.pipeline().watches.len(), 0);
    }
}
