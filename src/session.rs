//! Effect session: owns the effect and its buffers and drives frames through
//! host -> device -> effect -> host.

use crate::allocator::{self, BufferSet};
use crate::capture::FrameSource;
use crate::config::EffectConfig;
use crate::controller::{action_for_key, DisplayFlags, KeyAction};
use crate::effect::{ComputeStream, EffectHandle, EffectKind, EffectRuntime, ImageRole, Parameter};
use crate::error::{FxError, FxResult, RuntimeStatus};
use crate::frame::{PixelFormat, VideoFrame};
use crate::output::{FrameSink, Preview};
use crate::overlay::Overlay;
use crate::progress::ProgressReporter;
use crate::rate::FrameRateEstimator;
use crate::transfer::{transfer, TransferDirection};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{PixelType, ResizeOptions, Resizer};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

enum SessionState {
    Uninitialized,
    Initialized(BufferSet),
}

/// Where the frames of a stream go. Either may be absent.
#[derive(Default)]
pub struct StreamOutputs<'a> {
    pub sink: Option<&'a mut dyn FrameSink>,
    pub preview: Option<&'a mut dyn Preview>,
}

/// How a stream run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Frames fully processed and emitted.
    pub frames: u64,
    /// Whether the run stopped on a quit request rather than end of input.
    pub quit: bool,
}

/// One effect applied to a sequence of equally sized frames.
///
/// Buffers are allocated once, on the first [`EffectSession::allocate`];
/// the effect is released when the session is dropped.
pub struct EffectSession {
    effect: EffectHandle,
    kind: EffectKind,
    state: SessionState,
    flags: DisplayFlags,
    rate: FrameRateEstimator,
    overlay: Option<Option<Overlay>>,
    resizer: Resizer,
    /// Host result of the last cycle, reused across frames.
    output: VideoFrame,
}

impl EffectSession {
    /// Creates the effect for `kind` and binds it to a fresh compute stream.
    pub fn create(runtime: &dyn EffectRuntime, kind: EffectKind, model_dir: Option<&Path>) -> FxResult<Self> {
        let mut effect = EffectHandle::new(runtime.create_effect(kind)?);
        if let Some(dir) = model_dir {
            if kind.accepts_model_directory() {
                effect.set_parameter(Parameter::ModelDirectory(dir.to_path_buf()))?;
            } else {
                warn!("{} does not use a model directory, ignoring {:?}", kind, dir);
            }
        }
        effect.bind_stream(ComputeStream::new())?;

        Ok(Self {
            effect,
            kind,
            state: SessionState::Uninitialized,
            flags: DisplayFlags::default(),
            rate: FrameRateEstimator::new(),
            overlay: None,
            resizer: Resizer::new(),
            output: VideoFrame::from_data(0, 0, PixelFormat::Rgb, Vec::new()),
        })
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut DisplayFlags {
        &mut self.flags
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, SessionState::Initialized(_))
    }

    /// Size of the produced frames, once allocated.
    pub fn output_size(&self) -> Option<(u32, u32)> {
        match &self.state {
            SessionState::Initialized(set) => Some(set.output_size()),
            SessionState::Uninitialized => None,
        }
    }

    /// Allocates the buffers for `width` x `height` sources and returns the
    /// size of the produced frames.
    ///
    /// Repeating the call with the same size does nothing; a different size
    /// fails, buffers are never reallocated.
    pub fn allocate(&mut self, width: u32, height: u32, config: &EffectConfig) -> FxResult<(u32, u32)> {
        if let SessionState::Initialized(set) = &self.state {
            let src = set.host_src.descriptor();
            if src.width == width && src.height == height {
                return Ok(set.output_size());
            }
            return Err(FxError::AlreadyAllocated {
                width: src.width,
                height: src.height,
            });
        }

        let plan = allocator::plan(self.kind, width, height, config.output_height)?;
        if self.kind.takes_strength() {
            self.effect.set_parameter(Parameter::Strength(config.strength))?;
        }
        let set = BufferSet::allocate(&plan)?;
        self.effect.bind_image(ImageRole::Input, set.device_src.descriptor())?;
        self.effect.bind_image(ImageRole::Output, set.device_dst.descriptor())?;

        let (out_w, out_h) = plan.output_size();
        info!("{} session: {}x{} -> {}x{}", self.kind, width, height, out_w, out_h);
        self.output.data.reserve_exact(set.host_dst.descriptor().byte_size());
        self.state = SessionState::Initialized(set);
        Ok((out_w, out_h))
    }

    fn prepare(&mut self, config: &EffectConfig) -> FxResult<()> {
        if self.kind.takes_mode() {
            self.effect.set_parameter(Parameter::Mode(config.mode))?;
        }
        self.effect.load()?;
        Ok(())
    }

    /// Processes one image: one transfer-run-transfer cycle.
    ///
    /// Progress is reported at 50 after compute and 100 after output.
    pub fn process_image(
        &mut self,
        frame: &VideoFrame,
        config: &EffectConfig,
        outputs: StreamOutputs<'_>,
        progress: &mut ProgressReporter<'_>,
    ) -> FxResult<VideoFrame> {
        self.allocate(frame.width, frame.height, config)?;
        self.prepare(config)?;

        self.run_cycle(frame, true)?;
        progress.report(50.0);

        if let Some(sink) = outputs.sink {
            sink.write_frame(&self.output).map_err(|e| FxError::Write(e.to_string()))?;
        }
        if let Some(preview) = outputs.preview {
            preview.show(&self.output).map_err(|e| FxError::Write(e.to_string()))?;
        }
        progress.report(100.0);
        Ok(self.output.clone())
    }

    /// Processes frames from `source` until it runs dry, a quit key is
    /// pressed, or `cancel` is raised.
    pub fn process_stream(
        &mut self,
        source: &mut dyn FrameSource,
        config: &EffectConfig,
        outputs: StreamOutputs<'_>,
        progress: &mut ProgressReporter<'_>,
        cancel: Option<&AtomicBool>,
    ) -> FxResult<StreamSummary> {
        let info = source.info().clone();
        self.allocate(info.width, info.height, config)?;
        self.prepare(config)?;

        let live = source.is_live();
        let StreamOutputs { mut sink, mut preview } = outputs;
        let mut frames = 0u64;

        loop {
            if cancel.is_some_and(|c| c.load(Ordering::SeqCst)) {
                info!("Interrupted after {} frames", frames);
                return Ok(StreamSummary { frames, quit: true });
            }
            let Some(frame) = source.next_frame().map_err(|e| FxError::Read(e.to_string()))? else {
                break;
            };

            self.run_cycle(&frame, self.flags.effect_enabled)?;
            if let Some(sink) = sink.as_deref_mut() {
                sink.write_frame(&self.output).map_err(|e| FxError::Write(e.to_string()))?;
            }
            frames += 1;

            let mut quit = false;
            if let Some(preview) = preview.as_deref_mut() {
                let fps = self.rate.tick();
                self.draw_overlay(fps, live);
                preview.show(&self.output).map_err(|e| FxError::Write(e.to_string()))?;

                if let Some(key) = preview.poll_key() {
                    let action = action_for_key(key, live);
                    trace!("Key {:?} -> {:?}", key, action);
                    quit = self.flags.apply(action);
                    if action == KeyAction::ToggleEffectEnabled {
                        info!("Effect {}", if self.flags.effect_enabled { "enabled" } else { "disabled" });
                    }
                }
            }

            progress.report_frames(frames, info.frame_count);
            if quit {
                info!("Quit requested after {} frames", frames);
                return Ok(StreamSummary { frames, quit: true });
            }
        }

        debug!("Stream finished after {} frames", frames);
        Ok(StreamSummary { frames, quit: false })
    }

    /// Runs one frame through the buffers into `self.output`.
    fn run_cycle(&mut self, frame: &VideoFrame, effect_enabled: bool) -> FxResult<()> {
        let SessionState::Initialized(set) = &mut self.state else {
            return Err(RuntimeStatus::Initialization.into());
        };
        set.host_src.load_frame(frame)?;

        if effect_enabled {
            transfer(&set.host_src, &mut set.device_src, TransferDirection::ToDevice, &mut set.scratch)?;
            self.effect.run(&set.device_src, &mut set.device_dst)?;
            transfer(&set.device_dst, &mut set.host_dst, TransferDirection::ToHost, &mut set.scratch)?;
        } else if set.host_src.descriptor().same_size(set.host_dst.descriptor()) {
            transfer(&set.host_src, &mut set.host_dst, TransferDirection::ToHost, &mut set.scratch)?;
        } else {
            let src_desc = *set.host_src.descriptor();
            let dst_desc = *set.host_dst.descriptor();
            let src = ImageRef::new(src_desc.width, src_desc.height, set.host_src.bytes(), PixelType::U8x3)
                .map_err(|_| RuntimeStatus::Buffer)?;
            let mut dst = Image::from_slice_u8(dst_desc.width, dst_desc.height, set.host_dst.bytes_mut(), PixelType::U8x3)
                .map_err(|_| RuntimeStatus::Buffer)?;
            self.resizer
                .resize(&src, &mut dst, &ResizeOptions::new())
                .map_err(|_| RuntimeStatus::General)?;
        }

        set.host_dst.store_frame(&mut self.output)?;
        Ok(())
    }

    fn draw_overlay(&mut self, fps: Option<f32>, live: bool) {
        let fps = if self.flags.show_fps { fps } else { None };
        let effect = (live && self.flags.draw_visualization).then_some(self.flags.effect_enabled);
        if fps.is_none() && effect.is_none() {
            return;
        }
        if let Some(overlay) = self.overlay.get_or_insert_with(Overlay::from_system_fonts) {
            overlay.draw_status(&mut self.output, fps, effect);
        }
    }
}

impl Drop for EffectSession {
    fn drop(&mut self) {
        debug!("Closing {} session", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Key;
    use crate::effect::{Effect, HostRuntime};
    use crate::frame::{FourCc, PixelFormat, VideoStreamInfo};
    use crate::buffer::{Buffer, BufferDescriptor};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Host runtime whose effects count releases and record parameters.
    #[derive(Default)]
    struct CountingRuntime {
        released: Rc<Cell<usize>>,
        params: Rc<RefCell<Vec<Parameter>>>,
    }

    struct CountingEffect {
        inner: Box<dyn Effect>,
        released: Rc<Cell<usize>>,
        params: Rc<RefCell<Vec<Parameter>>>,
    }

    impl Drop for CountingEffect {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    impl Effect for CountingEffect {
        fn kind(&self) -> EffectKind {
            self.inner.kind()
        }
        fn set_parameter(&mut self, param: Parameter) -> Result<(), RuntimeStatus> {
            self.params.borrow_mut().push(param.clone());
            self.inner.set_parameter(param)
        }
        fn bind_image(&mut self, role: ImageRole, desc: &BufferDescriptor) -> Result<(), RuntimeStatus> {
            self.inner.bind_image(role, desc)
        }
        fn bind_stream(&mut self, stream: ComputeStream) -> Result<(), RuntimeStatus> {
            self.inner.bind_stream(stream)
        }
        fn load(&mut self) -> Result<(), RuntimeStatus> {
            self.inner.load()
        }
        fn run(&mut self, input: &Buffer, output: &mut Buffer) -> Result<(), RuntimeStatus> {
            self.inner.run(input, output)
        }
    }

    impl EffectRuntime for CountingRuntime {
        fn create_effect(&self, kind: EffectKind) -> Result<Box<dyn Effect>, RuntimeStatus> {
            Ok(Box::new(CountingEffect {
                inner: HostRuntime::new().create_effect(kind)?,
                released: self.released.clone(),
                params: self.params.clone(),
            }))
        }
        fn info(&self) -> String {
            String::new()
        }
    }

    struct VecSource {
        info: VideoStreamInfo,
        frames: VecDeque<VideoFrame>,
    }

    impl VecSource {
        fn new(width: u32, height: u32, count: usize, known_count: bool) -> Self {
            let frames = (0..count)
                .map(|i| gradient(width, height, i as u8))
                .collect();
            Self {
                info: VideoStreamInfo {
                    codec: FourCc::H264,
                    width,
                    height,
                    frame_rate: 30.0,
                    frame_count: known_count.then_some(count as u64),
                },
                frames,
            }
        }
    }

    impl FrameSource for VecSource {
        fn info(&self) -> &VideoStreamInfo {
            &self.info
        }
        fn next_frame(&mut self) -> anyhow::Result<Option<VideoFrame>> {
            Ok(self.frames.pop_front())
        }
    }

    #[derive(Default)]
    struct CollectSink {
        frames: Vec<VideoFrame>,
    }

    impl FrameSink for CollectSink {
        fn write_frame(&mut self, frame: &VideoFrame) -> anyhow::Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedPreview {
        keys: VecDeque<Key>,
        shown: usize,
    }

    impl Preview for ScriptedPreview {
        fn show(&mut self, _frame: &VideoFrame) -> anyhow::Result<()> {
            self.shown += 1;
            Ok(())
        }
        fn poll_key(&mut self) -> Option<Key> {
            self.keys.pop_front()
        }
    }

    fn gradient(width: u32, height: u32, seed: u8) -> VideoFrame {
        let data = (0..width * height * 3)
            .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
            .collect();
        VideoFrame::from_data(width, height, PixelFormat::Rgb, data)
    }

    fn session(kind: EffectKind) -> EffectSession {
        EffectSession::create(&HostRuntime::new(), kind, None).unwrap()
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let mut s = session(EffectKind::PassThrough);
        let config = EffectConfig::default();
        s.allocate(64, 48, &config).unwrap();
        let capacity = match &s.state {
            SessionState::Initialized(set) => set.scratch.capacity(),
            SessionState::Uninitialized => unreachable!(),
        };
        s.allocate(64, 48, &config).unwrap();
        match &s.state {
            SessionState::Initialized(set) => assert_eq!(set.scratch.capacity(), capacity),
            SessionState::Uninitialized => panic!("session lost its buffers"),
        }
        assert!(matches!(
            s.allocate(32, 24, &config),
            Err(FxError::AlreadyAllocated { width: 64, height: 48 })
        ));
    }

    #[test]
    fn test_missing_resolution_leaves_session_uninitialized() {
        let mut s = session(EffectKind::SuperResolution);
        let config = EffectConfig {
            output_height: Some(0),
            ..EffectConfig::default()
        };
        assert!(matches!(s.allocate(640, 360, &config), Err(FxError::MissingParameter(_))));
        assert!(!s.is_initialized());
        assert_eq!(s.output_size(), None);
    }

    #[test]
    fn test_anisotropic_request_fails_at_allocation() {
        let mut s = session(EffectKind::Upscale);
        let config = EffectConfig {
            output_height: Some(480),
            ..EffectConfig::default()
        };
        assert!(matches!(
            s.allocate(1920, 1080, &config),
            Err(FxError::ResolutionMismatch { .. })
        ));
        assert!(!s.is_initialized());
    }

    #[test]
    fn test_single_image_passthrough() {
        let mut s = session(EffectKind::PassThrough);
        let frame = gradient(100, 100, 3);
        let mut sink = CollectSink::default();
        let mut seen = Vec::new();
        let mut record = |p: f32| seen.push(p);
        let mut progress = ProgressReporter::new(Some(&mut record));

        let outputs = StreamOutputs {
            sink: Some(&mut sink),
            preview: None,
        };
        let result = s
            .process_image(&frame, &EffectConfig::default(), outputs, &mut progress)
            .unwrap();
        drop(progress);

        assert_eq!(result, frame);
        assert_eq!(sink.frames, vec![frame]);
        assert_eq!(seen, vec![50.0, 100.0]);
    }

    #[test]
    fn test_single_image_super_resolution() {
        let mut s = session(EffectKind::SuperResolution);
        let config = EffectConfig {
            output_height: Some(40),
            strength: 0.5,
            ..EffectConfig::default()
        };
        let result = s
            .process_image(&gradient(32, 20, 0), &config, StreamOutputs::default(), &mut ProgressReporter::none())
            .unwrap();
        assert_eq!((result.width, result.height), (64, 40));
        assert_eq!(s.output_size(), Some((64, 40)));
    }

    #[test]
    fn test_stream_progress_is_per_frame() {
        let mut s = session(EffectKind::ArtifactReduction);
        let mut source = VecSource::new(16, 8, 5, true);
        let mut sink = CollectSink::default();
        let mut seen = Vec::new();
        let mut record = |p: f32| seen.push(p);
        let mut progress = ProgressReporter::new(Some(&mut record));

        let outputs = StreamOutputs {
            sink: Some(&mut sink),
            preview: None,
        };
        let summary = s
            .process_stream(&mut source, &EffectConfig::default(), outputs, &mut progress, None)
            .unwrap();
        drop(progress);

        assert_eq!(summary, StreamSummary { frames: 5, quit: false });
        assert_eq!(sink.frames.len(), 5);
        assert_eq!(seen, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
    }

    #[test]
    fn test_stream_without_frame_count_reports_nothing() {
        let mut s = session(EffectKind::PassThrough);
        let mut source = VecSource::new(8, 8, 3, false);
        let mut calls = 0;
        let mut count = |_: f32| calls += 1;
        let mut progress = ProgressReporter::new(Some(&mut count));
        let summary = s
            .process_stream(&mut source, &EffectConfig::default(), StreamOutputs::default(), &mut progress, None)
            .unwrap();
        drop(progress);
        assert_eq!(summary.frames, 3);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_quit_key_stops_stream() {
        let mut s = session(EffectKind::PassThrough);
        let mut source = VecSource::new(8, 8, 6, true);
        let mut sink = CollectSink::default();
        let mut preview = ScriptedPreview {
            keys: VecDeque::from([Key::Other, Key::Char('f'), Key::Char('q')]),
            shown: 0,
        };

        let outputs = StreamOutputs {
            sink: Some(&mut sink),
            preview: Some(&mut preview),
        };
        let summary = s
            .process_stream(&mut source, &EffectConfig::default(), outputs, &mut ProgressReporter::none(), None)
            .unwrap();

        assert_eq!(summary, StreamSummary { frames: 3, quit: true });
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(preview.shown, 3);
        assert!(s.flags().show_fps);
        assert_eq!(source.frames.len(), 3);
    }

    #[test]
    fn test_cancel_flag_stops_before_next_frame() {
        let mut s = session(EffectKind::PassThrough);
        let mut source = VecSource::new(8, 8, 4, true);
        let cancel = AtomicBool::new(true);
        let summary = s
            .process_stream(
                &mut source,
                &EffectConfig::default(),
                StreamOutputs::default(),
                &mut ProgressReporter::none(),
                Some(&cancel),
            )
            .unwrap();
        assert_eq!(summary, StreamSummary { frames: 0, quit: true });
        assert_eq!(source.frames.len(), 4);
    }

    #[test]
    fn test_disabled_effect_still_produces_output_size() {
        let mut s = session(EffectKind::Upscale);
        s.flags_mut().effect_enabled = false;
        let config = EffectConfig {
            output_height: Some(16),
            ..EffectConfig::default()
        };
        let mut source = VecSource::new(16, 8, 2, true);
        let mut sink = CollectSink::default();
        let outputs = StreamOutputs {
            sink: Some(&mut sink),
            preview: None,
        };
        s.process_stream(&mut source, &config, outputs, &mut ProgressReporter::none(), None)
            .unwrap();
        assert!(sink.frames.iter().all(|f| (f.width, f.height) == (32, 16)));
    }

    /// Records where each written frame's pixels live.
    #[derive(Default)]
    struct AddressSink {
        addresses: Vec<usize>,
    }

    impl FrameSink for AddressSink {
        fn write_frame(&mut self, frame: &VideoFrame) -> anyhow::Result<()> {
            self.addresses.push(frame.data.as_ptr() as usize);
            Ok(())
        }
    }

    #[test]
    fn test_stream_reuses_output_storage() {
        for enabled in [true, false] {
            let mut s = session(EffectKind::Upscale);
            s.flags_mut().effect_enabled = enabled;
            let config = EffectConfig {
                output_height: Some(16),
                ..EffectConfig::default()
            };
            let mut source = VecSource::new(16, 8, 4, true);
            let mut sink = AddressSink::default();
            let outputs = StreamOutputs {
                sink: Some(&mut sink),
                preview: None,
            };
            s.process_stream(&mut source, &config, outputs, &mut ProgressReporter::none(), None)
                .unwrap();
            assert_eq!(sink.addresses.len(), 4);
            assert!(sink.addresses.iter().all(|a| *a == sink.addresses[0]));
        }
    }

    #[test]
    fn test_allocate_returns_output_size() {
        let mut s = session(EffectKind::SuperResolution);
        let config = EffectConfig {
            output_height: Some(40),
            ..EffectConfig::default()
        };
        assert_eq!(s.allocate(32, 20, &config).unwrap(), (64, 40));
        assert_eq!(s.allocate(32, 20, &config).unwrap(), (64, 40));
    }

    #[test]
    fn test_disabled_passthrough_copies_frames() {
        let mut s = session(EffectKind::ArtifactReduction);
        s.flags_mut().effect_enabled = false;
        let mut source = VecSource::new(8, 4, 1, true);
        let expected = source.frames[0].clone();
        let mut sink = CollectSink::default();
        let outputs = StreamOutputs {
            sink: Some(&mut sink),
            preview: None,
        };
        s.process_stream(&mut source, &EffectConfig::default(), outputs, &mut ProgressReporter::none(), None)
            .unwrap();
        assert_eq!(sink.frames, vec![expected]);
    }

    #[test]
    fn test_wrong_frame_size_aborts_stream() {
        let mut s = session(EffectKind::PassThrough);
        let mut source = VecSource::new(8, 8, 2, true);
        source.frames[1] = gradient(4, 4, 0);
        let result = s.process_stream(
            &mut source,
            &EffectConfig::default(),
            StreamOutputs::default(),
            &mut ProgressReporter::none(),
            None,
        );
        assert!(matches!(result, Err(FxError::Transfer(_))));
    }

    #[test]
    fn test_effect_released_on_every_exit() {
        let released = Rc::new(Cell::new(0));
        let runtime = CountingRuntime {
            released: released.clone(),
            ..CountingRuntime::default()
        };

        {
            let mut s = EffectSession::create(&runtime, EffectKind::SuperResolution, None).unwrap();
            assert!(s.allocate(640, 360, &EffectConfig::default()).is_err());
        }
        assert_eq!(released.get(), 1);

        {
            let mut s = EffectSession::create(&runtime, EffectKind::PassThrough, None).unwrap();
            s.process_image(&gradient(4, 4, 0), &EffectConfig::default(), StreamOutputs::default(), &mut ProgressReporter::none())
                .unwrap();
        }
        assert_eq!(released.get(), 2);
    }

    #[test]
    fn test_upscale_omits_model_directory() {
        let runtime = CountingRuntime::default();
        let mut s = EffectSession::create(&runtime, EffectKind::Upscale, Some(Path::new("models"))).unwrap();
        assert!(runtime.params.borrow().is_empty());

        let config = EffectConfig {
            output_height: Some(16),
            strength: 0.25,
            ..EffectConfig::default()
        };
        s.allocate(16, 8, &config).unwrap();
        assert_eq!(*runtime.params.borrow(), vec![Parameter::Strength(0.25)]);
    }

    #[test]
    fn test_model_directory_reaches_model_effects() {
        let runtime = CountingRuntime::default();
        let _s = EffectSession::create(&runtime, EffectKind::ArtifactReduction, Some(Path::new("models"))).unwrap();
        assert_eq!(
            *runtime.params.borrow(),
            vec![Parameter::ModelDirectory(Path::new("models").to_path_buf())]
        );
    }

    #[test]
    fn test_missing_model_fails_at_load() {
        let mut s = EffectSession::create(
            &HostRuntime::new(),
            EffectKind::ArtifactReduction,
            Some(Path::new("videofx-no-such-model-dir")),
        )
        .unwrap();
        let err = s
            .process_image(&gradient(4, 4, 0), &EffectConfig::default(), StreamOutputs::default(), &mut ProgressReporter::none())
            .unwrap_err();
        assert_eq!(err.code(), RuntimeStatus::Model.code());
    }
}
