// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// V4L2 Video Device Tests
//
// TESTING LAYERS:
//
// Layer 2 (Virtual Device - No hardware required):
//   - format negotiation over single-plane, multi-plane and metadata queues
//   - buffer export with rollback, import, release and its cancellation
//   - queue/dequeue through the buffer cache, backpressure when full
//   - stream-off cancellation and output metadata
//   - memory-to-memory queue pairs
//
// Layer 3 (Hardware Integration - Requires a V4L2 capture node):
//   - test_hardware_capture_formats: open /dev/video0 and enumerate formats
//
// REQUIREMENTS for Layer 3 tests (marked with #[ignore]):
//   - A V4L2 capture device at /dev/video0 (or CAMSTACK_TEST_VIDEO)
//
// RUN LAYER 2:
//   cargo test --test video_device
//
// RUN LAYER 3 (on hardware):
//   cargo test --test video_device -- --include-ignored --nocapture

mod common;

use camstack::{
    fourcc::FourCC,
    framebuffer::FrameStatus,
    geometry::Size,
    sys,
    v4l2::{
        BufferType, FormatVariant, PlaneFormat, V4L2DeviceFormat, V4L2M2MDevice, V4L2VideoDevice,
    },
    Error,
};
use common::{collector, init_logging, null_buffer, VirtualConfig, VirtualDevice};
use serial_test::serial;

const CAPTURE: u32 = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE;
const CAPTURE_MPLANE: u32 = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE;
const OUTPUT: u32 = sys::V4L2_BUF_TYPE_VIDEO_OUTPUT;

fn open(config: VirtualConfig) -> (VirtualDevice, V4L2VideoDevice) {
    init_logging();
    let virt = VirtualDevice::new(config);
    let mut video = V4L2VideoDevice::with_io("/dev/video-virtual", virt.boxed());
    video.open().expect("open virtual device");
    (virt, video)
}

fn nv12_two_planes() -> V4L2DeviceFormat {
    let mut format = V4L2DeviceFormat {
        size: Size::new(640, 480),
        fourcc: FourCC::new(b"NM12"),
        planes_count: 2,
        ..Default::default()
    };
    format.planes[0] = PlaneFormat {
        bpl: 640,
        size: 640 * 480,
    };
    format.planes[1] = PlaneFormat {
        bpl: 640,
        size: 640 * 240,
    };
    format
}

#[test]
fn test_open_classifies_queue() {
    let (_virt, video) = open(VirtualConfig::capture());
    assert!(video.is_open());
    assert_eq!(video.buffer_type(), Some(BufferType::VideoCapture));
    assert_eq!(video.format_variant(), Some(FormatVariant::SinglePlane));
    assert_eq!(video.caps().driver(), "vivid");

    let (_virt, video) = open(VirtualConfig::capture_mplane(2));
    assert_eq!(video.buffer_type(), Some(BufferType::VideoCaptureMplane));

    let (_virt, video) = open(VirtualConfig::meta_capture());
    assert_eq!(video.format_variant(), Some(FormatVariant::Meta));
}

#[test]
fn test_single_plane_format_round_trip() {
    let (_virt, mut video) = open(VirtualConfig::capture());
    let requested = V4L2DeviceFormat::packed(Size::new(640, 480), FourCC::new(b"YUYV"), 1280, 0);

    let applied = video.set_format(&requested).unwrap();
    assert_eq!(applied.size, requested.size);
    assert_eq!(applied.fourcc, requested.fourcc);
    assert_eq!(applied.planes()[0].bpl, 1280);
    assert_eq!(applied.planes()[0].size, 1280 * 480);
    assert_eq!(video.get_format().unwrap(), applied);
}

#[test]
fn test_driver_adjustment_is_returned() {
    let (_virt, mut video) = open(VirtualConfig::capture());
    let requested = V4L2DeviceFormat::packed(Size::new(4096, 3072), FourCC::new(b"YUYV"), 0, 0);
    let applied = video.set_format(&requested).unwrap();
    assert_eq!(applied.size, Size::new(1920, 1080));
    assert_eq!(applied.planes()[0].bpl, 1920 * 2);
}

#[test]
fn test_multiplane_format_round_trip() {
    let (_virt, mut video) = open(VirtualConfig::capture_mplane(2));
    let requested = nv12_two_planes();
    let applied = video.set_format(&requested).unwrap();
    assert_eq!(applied, requested);
    assert_eq!(video.get_format().unwrap().planes().len(), 2);
}

#[test]
fn test_meta_format_fills_buffer_size() {
    let (_virt, mut video) = open(VirtualConfig::meta_capture());
    let requested = V4L2DeviceFormat {
        fourcc: FourCC::new(b"RK1S"),
        planes_count: 1,
        ..Default::default()
    };
    let applied = video.set_format(&requested).unwrap();
    assert_eq!(applied.fourcc, FourCC::new(b"RK1S"));
    assert_eq!(applied.planes()[0].size, 4096);
}

#[test]
fn test_formats_enumeration() {
    let (_virt, video) = open(VirtualConfig::capture());
    let formats = video.formats().unwrap();
    assert_eq!(formats.len(), 2);
    assert_eq!(formats.sizes(FourCC::new(b"YUYV")).len(), 2);
    assert!(formats.supports(FourCC::new(b"MJPG"), Size::new(1920, 1080)));
    assert!(!formats.supports(FourCC::new(b"MJPG"), Size::new(640, 480)));
}

#[test]
fn test_export_buffers_then_already_allocated() {
    let (virt, mut video) = open(VirtualConfig::capture_mplane(2));
    let format = video.set_format(&nv12_two_planes()).unwrap();

    let buffers = video.export_buffers(4).unwrap();
    assert_eq!(buffers.len(), 4);
    for buffer in &buffers {
        assert_eq!(buffer.planes().len(), format.planes_count as usize);
    }
    assert_eq!(virt.state().exported, 8);
    assert_eq!(video.buffer_count(), 4);

    assert!(matches!(video.export_buffers(4), Err(Error::AlreadyAllocated)));
}

#[test]
fn test_export_failure_rolls_back() {
    let (virt, mut video) = open(VirtualConfig::capture());
    virt.state().fail_export_at = Some(2);

    let err = video.export_buffers(4).unwrap_err();
    assert!(matches!(
        err,
        Error::Ioctl {
            request: "VIDIOC_EXPBUF",
            ..
        }
    ));
    assert_eq!(video.buffer_count(), 0);
    assert_eq!(virt.queue(CAPTURE, |queue| queue.count), 0);

    virt.state().fail_export_at = None;
    assert_eq!(video.export_buffers(4).unwrap().len(), 4);
}

#[test]
fn test_invalid_plane_count_is_rejected() {
    let (virt, mut video) = open(VirtualConfig::capture_mplane(0));
    assert!(matches!(
        video.export_buffers(2),
        Err(Error::InvalidPlaneCount(0))
    ));
    assert_eq!(virt.queue(CAPTURE_MPLANE, |queue| queue.count), 0);
}

#[test]
fn test_insufficient_buffers() {
    let config = VirtualConfig {
        max_buffers: 2,
        ..VirtualConfig::capture()
    };
    let (virt, mut video) = open(config);
    assert!(matches!(
        video.import_buffers(4),
        Err(Error::InsufficientBuffers {
            requested: 4,
            allocated: 2
        })
    ));
    assert_eq!(virt.queue(CAPTURE, |queue| queue.count), 0);
    assert_eq!(video.buffer_count(), 0);
}

#[test]
fn test_full_cache_is_backpressure() {
    let (virt, mut video) = open(VirtualConfig::capture());
    video.import_buffers(2).unwrap();

    let length = 640 * 480 * 2;
    video.queue_buffer(null_buffer(&[length])).unwrap();
    video.queue_buffer(null_buffer(&[length])).unwrap();

    let err = video.queue_buffer(null_buffer(&[length])).unwrap_err();
    assert!(err.is_busy());
    assert_eq!(err.into_buffer().planes()[0].length(), length);
    assert_eq!(virt.calls("VIDIOC_QBUF"), 2);
    assert_eq!(video.queued_count(), 2);
}

#[test]
fn test_imported_buffer_passes_descriptor() {
    let (virt, mut video) = open(VirtualConfig::capture());
    video.import_buffers(1).unwrap();

    let buffer = null_buffer(&[4096]);
    let fd = buffer.planes()[0].raw_fd();
    video.queue_buffer(buffer).unwrap();
    let fds = virt.queue(CAPTURE, |queue| queue.queued[0].fds.clone());
    assert_eq!(fds, vec![fd]);
}

#[test]
fn test_capture_completion_and_requeue_hit() {
    let (virt, mut video) = open(VirtualConfig::capture());
    let (received, listener) = collector();
    video.set_buffer_listener(listener);

    let buffers = video.export_buffers(2).unwrap();
    for buffer in buffers {
        video.queue_buffer(buffer).unwrap();
    }
    video.stream_on().unwrap();
    assert!(video.notifier().unwrap().is_enabled());

    assert!(virt.complete(CAPTURE, false));
    assert!(video.buffer_available().unwrap());
    assert!(!video.buffer_available().unwrap());

    let frame = received.borrow_mut().pop().unwrap();
    assert_eq!(frame.metadata().status, FrameStatus::Success);
    assert_eq!(frame.metadata().sequence, 1);
    assert_eq!(frame.metadata().timestamp, 1_000_500_000);
    assert_eq!(frame.metadata().planes, vec![640 * 480 * 2]);

    video.queue_buffer(frame).unwrap();
    let requeued = virt.queue(CAPTURE, |queue| queue.queued.back().map(|b| b.index));
    assert_eq!(requeued, Some(0));

    assert!(virt.complete(CAPTURE, true));
    assert!(video.buffer_available().unwrap());
    let frame = received.borrow_mut().pop().unwrap();
    assert_eq!(frame.metadata().status, FrameStatus::Error);

    video.stream_off().unwrap();
}

#[test]
fn test_stream_off_cancels_in_flight_buffers() {
    let (_virt, mut video) = open(VirtualConfig::capture_mplane(2));
    video.set_format(&nv12_two_planes()).unwrap();
    let (received, listener) = collector();
    video.set_buffer_listener(listener);

    for buffer in video.export_buffers(3).unwrap() {
        video.queue_buffer(buffer).unwrap();
    }
    video.stream_on().unwrap();
    assert!(matches!(video.close(), Err(Error::InvalidState(_))));

    video.stream_off().unwrap();
    assert_eq!(video.queued_count(), 0);
    assert!(!video.is_streaming());
    assert!(!video.notifier().unwrap().is_enabled());

    let cancelled = received.borrow();
    assert_eq!(cancelled.len(), 3);
    assert!(cancelled
        .iter()
        .all(|buffer| buffer.metadata().status == FrameStatus::Cancelled));
}

#[test]
fn test_release_buffers_is_idempotent() {
    let (virt, mut video) = open(VirtualConfig::capture());
    let buffers = video.export_buffers(2).unwrap();
    drop(buffers);

    video.release_buffers().unwrap();
    video.release_buffers().unwrap();
    assert_eq!(video.buffer_count(), 0);
    assert_eq!(virt.queue(CAPTURE, |queue| queue.count), 0);

    assert_eq!(video.export_buffers(2).unwrap().len(), 2);
    video.close().unwrap();
    assert!(!video.is_open());
    assert!(matches!(video.export_buffers(2), Err(Error::NotOpen)));
}

#[test]
fn test_release_cancels_queued_buffers() {
    let (virt, mut video) = open(VirtualConfig::capture());
    let (received, listener) = collector();
    video.set_buffer_listener(listener);
    video.import_buffers(2).unwrap();

    let length = 640 * 480 * 2;
    video.queue_buffer(null_buffer(&[length])).unwrap();
    video.queue_buffer(null_buffer(&[length])).unwrap();
    assert!(video.notifier().unwrap().is_enabled());

    video.release_buffers().unwrap();
    assert_eq!(video.queued_count(), 0);
    assert_eq!(video.buffer_count(), 0);
    assert!(!video.notifier().unwrap().is_enabled());
    assert_eq!(virt.queue(CAPTURE, |queue| queue.queued.len()), 0);
    {
        let cancelled = received.borrow();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled
            .iter()
            .all(|buffer| buffer.metadata().status == FrameStatus::Cancelled));
    }

    video.import_buffers(2).unwrap();
    video.queue_buffer(null_buffer(&[length])).unwrap();
    assert_eq!(video.queued_count(), 1);
    assert_eq!(virt.queue(CAPTURE, |queue| queue.queued[0].index), 0);
}

#[test]
fn test_release_refused_while_streaming() {
    let (_virt, mut video) = open(VirtualConfig::capture());
    for buffer in video.export_buffers(2).unwrap() {
        video.queue_buffer(buffer).unwrap();
    }
    video.stream_on().unwrap();

    assert!(matches!(video.release_buffers(), Err(Error::InvalidState(_))));
    assert_eq!(video.queued_count(), 2);
    assert_eq!(video.buffer_count(), 2);
    video.stream_off().unwrap();
    video.release_buffers().unwrap();
}

#[test]
fn test_dequeue_requires_buffers() {
    let (virt, mut video) = open(VirtualConfig::capture());
    assert!(matches!(video.dequeue_buffer(), Err(Error::NotAllocated)));
    assert!(matches!(video.buffer_available(), Err(Error::NotAllocated)));
    assert_eq!(virt.calls("VIDIOC_DQBUF"), 0);

    video.import_buffers(1).unwrap();
    assert!(video.dequeue_buffer().unwrap().is_none());
}

#[test]
fn test_output_metadata_is_queued() {
    let (virt, mut video) = open(VirtualConfig::output());
    assert_eq!(video.buffer_type(), Some(BufferType::VideoOutput));
    video.import_buffers(2).unwrap();

    let mut buffer = null_buffer(&[4096]);
    let metadata = buffer.metadata_mut();
    metadata.planes = vec![1234];
    metadata.sequence = 42;
    metadata.timestamp = 3_000_250_000;
    video.queue_buffer(buffer).unwrap();

    let queued = virt.queue(OUTPUT, |queue| queue.queued[0].clone());
    assert_eq!(queued.bytesused, vec![1234]);
    assert_eq!(queued.sequence, 42);
    assert_eq!(queued.timestamp, (3, 250));
}

#[test]
fn test_m2m_queue_pair() {
    init_logging();
    let virt = VirtualDevice::new(VirtualConfig::m2m());
    let mut m2m = V4L2M2MDevice::new("/dev/video-m2m");
    m2m.open_with(virt.boxed()).unwrap();

    assert_eq!(
        m2m.output().buffer_type(),
        Some(BufferType::VideoOutputMplane)
    );
    assert_eq!(
        m2m.capture().buffer_type(),
        Some(BufferType::VideoCaptureMplane)
    );

    let (returned, listener) = collector();
    m2m.output().set_buffer_listener(listener);
    m2m.output().import_buffers(1).unwrap();
    let mut source = null_buffer(&[4096]);
    source.metadata_mut().planes = vec![100];
    m2m.output().queue_buffer(source).unwrap();
    m2m.output().stream_on().unwrap();

    let captured = m2m.capture().export_buffers(1).unwrap();
    assert_eq!(captured.len(), 1);

    assert!(virt.complete(sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE, false));
    assert!(m2m.output().buffer_available().unwrap());
    assert_eq!(returned.borrow()[0].metadata().planes, vec![100]);

    m2m.output().stream_off().unwrap();
    m2m.close().unwrap();
}

#[test]
#[ignore = "test requires V4L2 capture hardware (run with --include-ignored to enable)"]
#[serial]
fn test_hardware_capture_formats() {
    init_logging();
    let node = std::env::var("CAMSTACK_TEST_VIDEO").unwrap_or_else(|_| "/dev/video0".to_owned());
    let mut video = V4L2VideoDevice::new(&node);
    video.open().unwrap();
    println!(
        "{}: {} ({}) {:?}",
        node,
        video.caps().card(),
        video.caps().driver(),
        video.buffer_type()
    );

    let formats = video.formats().unwrap();
    for (fourcc, sizes) in formats.iter() {
        println!("  {}: {} sizes", fourcc, sizes.len());
    }

    let format = video.get_format().unwrap();
    println!("  current {}", format);
    let buffers = video.export_buffers(4).unwrap();
    assert_eq!(buffers.len(), 4);
    video.release_buffers().unwrap();
}
