//! Session, image and property behavior against the simulated SDK

use pgrcam_core::layout::{decode_property, encode_property, encode_property_info};
use pgrcam_core::{
    CaptureError, ErrorCode, ErrorKind, FrameShape, Operation, PropertyType, Session,
    SessionState, SimCameraConfig, SimConfig, SimDriver,
};
use pretty_assertions::assert_eq;

fn streaming(driver: &SimDriver) -> Session {
    let mut session = Session::create(driver).unwrap();
    let camera = session.identify_camera(0).unwrap();
    session.connect(&camera).unwrap();
    session.start_capture().unwrap();
    session
}

#[test]
fn test_create_then_destroy() {
    let driver = SimDriver::default();
    let session = Session::create(&driver).unwrap();
    assert_eq!(session.state(), SessionState::Created);
    assert_eq!(driver.live_contexts(), 1);

    session.destroy().unwrap();
    assert_eq!(driver.live_contexts(), 0);
}

#[test]
fn test_create_failure_is_resource_error() {
    let driver = SimDriver::default();
    driver.fail_next(Operation::CreateContext, ErrorCode::MEMORY_ALLOCATION_FAILED);

    let err = Session::create(&driver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(err.code(), ErrorCode::MEMORY_ALLOCATION_FAILED);
    assert_eq!(driver.live_contexts(), 0);
}

#[test]
fn test_dropped_session_releases_context() {
    let driver = SimDriver::default();
    {
        let mut session = streaming(&driver);
        let _image = session.create_image().unwrap();
        assert_eq!(driver.live_images(), 1);
    }
    assert_eq!(driver.live_contexts(), 0);
    assert_eq!(driver.live_images(), 0);
}

#[test]
fn test_lifecycle_states() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();
    assert_eq!(session.camera_count().unwrap(), 1);

    let camera = session.identify_camera(0).unwrap();
    session.connect(&camera).unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session.start_capture().unwrap();
    assert_eq!(session.state(), SessionState::Capturing);

    session.stop_capture().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::Created);
    session.destroy().unwrap();
}

#[test]
fn test_identify_out_of_range_is_not_found() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();
    let err = session.identify_camera(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_connect_with_bad_identity_shape_leaves_session_usable() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();

    let err = session.connect_words(&[1, 2, 3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(session.state(), SessionState::Created);

    let camera = session.identify_camera(0).unwrap();
    session.connect_words(camera.words()).unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_connect_rejected_by_sdk_is_connection_error() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();
    let err = session.connect_words(&[9, 9, 9, 9]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.code(), ErrorCode::FAILED_GUID);
    assert_eq!(session.state(), SessionState::Created);
}

#[test]
fn test_busy_camera_rejects_second_session() {
    let driver = SimDriver::default();
    let _first = streaming(&driver);
    let mut second = Session::create(&driver).unwrap();
    let camera = second.identify_camera(0).unwrap();
    assert_eq!(driver.identity(0), Some(camera));
    assert_eq!(driver.identity(1), None);

    let err = second.connect(&camera).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_unconnected_calls_surface_state_error() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();

    assert_eq!(session.camera_info().unwrap_err().kind(), ErrorKind::State);
    assert_eq!(session.read_register(0x0610).unwrap_err().kind(), ErrorKind::State);
    assert_eq!(
        session.property(PropertyType::Gain).unwrap_err().kind(),
        ErrorKind::State
    );

    let mut image = session.create_image().unwrap();
    let err = session.retrieve_buffer(&mut image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_retrieve_before_start_is_capture_error() {
    let driver = SimDriver::default();
    let mut session = Session::create(&driver).unwrap();
    let camera = session.identify_camera(0).unwrap();
    session.connect(&camera).unwrap();

    let mut image = session.create_image().unwrap();
    let err = session.retrieve_buffer(&mut image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capture);
    assert_eq!(err.code(), ErrorCode::ISOCH_NOT_STARTED);
}

#[test]
fn test_double_start_is_forwarded() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);
    let err = session.start_capture().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.code(), ErrorCode::ISOCH_ALREADY_STARTED);
}

#[test]
fn test_retrieve_timeout_is_capture_error() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);
    let mut image = session.create_image().unwrap();
    driver.fail_next(Operation::RetrieveBuffer, ErrorCode::TIMEOUT);

    let err = session.retrieve_buffer(&mut image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capture);
    assert_eq!(err.code(), ErrorCode::TIMEOUT);

    // the image survives a failed retrieve
    session.retrieve_buffer(&mut image).unwrap();
}

#[test]
fn test_mono_shape_law() {
    let driver = SimDriver::new(SimConfig::empty().with_camera(SimCameraConfig::mono(640, 480)));
    let mut session = streaming(&driver);
    let mut image = session.create_image().unwrap();

    let frame = session.retrieve_buffer(&mut image).unwrap();
    assert_eq!(frame.header().stride, 640);
    assert_eq!(frame.shape().dims(), vec![640, 480]);
    assert_eq!(frame.bytes().len(), 640 * 480);
    assert_eq!(frame.array().unwrap().shape(), &[480, 640]);
}

#[test]
fn test_color_shape_law() {
    let driver = SimDriver::new(SimConfig::empty().with_camera(SimCameraConfig::color(640, 480)));
    let mut session = streaming(&driver);
    let mut image = session.create_image().unwrap();

    let frame = session.retrieve_buffer(&mut image).unwrap();
    assert_eq!(frame.header().stride, 1920);
    assert_eq!(frame.shape(), FrameShape::Color { cols: 640, rows: 480 });
    assert_eq!(frame.shape().dims(), vec![3, 640, 480]);
    assert_eq!(frame.bytes().len(), 1920 * 480);
}

#[test]
fn test_padded_rows_are_copied_whole() {
    let camera = SimCameraConfig {
        row_padding: 8,
        ..SimCameraConfig::color(4, 2)
    };
    let driver = SimDriver::new(SimConfig::empty().with_camera(camera));
    let mut session = streaming(&driver);
    let mut image = session.create_image().unwrap();

    let frame = session.retrieve_buffer(&mut image).unwrap().to_frame();
    assert_eq!(frame.header().stride, 20);
    assert_eq!(frame.bytes().len(), 40);
    assert_eq!(frame.array().unwrap().shape(), &[2, 4, 3]);
}

#[test]
fn test_copied_frame_outlives_next_retrieve() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);
    let mut image = session.create_image().unwrap();

    let first = session.retrieve_buffer(&mut image).unwrap().to_frame();
    let second = session.retrieve_buffer(&mut image).unwrap().to_frame();
    assert_ne!(first.bytes()[0], second.bytes()[0]);
    assert_eq!(image.frame().unwrap().bytes(), second.bytes());
}

#[test]
fn test_property_info_is_stable() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    let a = encode_property_info(&session.property_info(PropertyType::Shutter).unwrap());
    let b = encode_property_info(&session.property_info(PropertyType::Shutter).unwrap());
    assert_eq!(a.to_vec(), b.to_vec());
}

#[test]
fn test_absent_property_reports_not_present() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    let info = session.property_info(PropertyType::Zoom).unwrap();
    assert!(!info.present);

    let mut zoom = session.property(PropertyType::Zoom).unwrap();
    zoom.value_a = 10;
    let err = session.set_property(&zoom).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Property);
    assert_eq!(err.code(), ErrorCode::PROPERTY_NOT_PRESENT);
}

#[test]
fn test_set_then_get_property_round_trips() {
    let driver = SimDriver::new(SimConfig::empty().with_camera(SimCameraConfig::color(64, 48)));
    let mut session = streaming(&driver);

    let mut balance = session.property(PropertyType::WhiteBalance).unwrap();
    balance.value_a = 500;
    balance.value_b = 700;
    session.set_property(&balance).unwrap();

    let mut shutter = session.property(PropertyType::Shutter).unwrap();
    shutter.abs_control = true;
    shutter.abs_value = 12.5;
    session.set_property(&shutter).unwrap();

    let balance_back = session.property(PropertyType::WhiteBalance).unwrap();
    assert_eq!(balance_back.value_a, 500);
    assert_eq!(balance_back.value_b, 700);
    let shutter_back = session.property(PropertyType::Shutter).unwrap();
    assert_eq!(shutter_back.abs_value, 12.5);
}

#[test]
fn test_property_record_set_through_codec() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    let mut gain = session.property(PropertyType::Gain).unwrap();
    gain.value_a = 300;
    let record = encode_property(&gain);
    session.set_property(&decode_property(&record).unwrap()).unwrap();

    assert_eq!(session.property(PropertyType::Gain).unwrap(), gain);
}

#[test]
fn test_out_of_range_property_value_is_rejected() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    let mut gain = session.property(PropertyType::Gain).unwrap();
    gain.value_a = 5000;
    let err = session.set_property(&gain).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Property);
}

#[test]
fn test_register_round_trip() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    session.write_register(0x0614, 0x8000_0000).unwrap();
    assert_eq!(session.read_register(0x0614).unwrap(), 0x8000_0000);
}

#[test]
fn test_register_rejections_are_register_errors() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);

    let err = session.read_register(0x0F00).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Register);
    assert_eq!(err.code(), ErrorCode::READ_REGISTER_FAILED);

    let err = session.write_register(0x0400, 1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::WRITE_REGISTER_FAILED);
}

#[test]
fn test_camera_info_snapshot() {
    let driver = SimDriver::new(SimConfig::empty().with_camera(SimCameraConfig::color(64, 48)));
    let mut session = streaming(&driver);

    let info = session.camera_info().unwrap();
    assert!(info.is_color);
    assert_eq!(info.serial_number, 13_142_459);
    assert_eq!(info.sensor_resolution, "64x48");
}

#[test]
fn test_no_leaks_after_injected_failures() {
    let driver = SimDriver::default();
    for op in [
        Operation::Connect,
        Operation::StartCapture,
        Operation::CreateImage,
        Operation::RetrieveBuffer,
    ] {
        driver.fail_next(op, ErrorCode::FAILED);
        let result = (|| -> Result<(), CaptureError> {
            let mut session = streaming_checked(&driver)?;
            let mut image = session.create_image()?;
            session.retrieve_buffer(&mut image)?;
            Ok(())
        })();
        assert!(result.is_err(), "{} should have failed", op);
        assert_eq!(driver.live_contexts(), 0, "context leaked after {}", op);
        assert_eq!(driver.live_images(), 0, "image leaked after {}", op);
    }
}

fn streaming_checked(driver: &SimDriver) -> Result<Session, CaptureError> {
    let mut session = Session::create(driver)?;
    let camera = session.identify_camera(0)?;
    session.connect(&camera)?;
    session.start_capture()?;
    Ok(session)
}

#[test]
fn test_image_destroy_releases_buffer() {
    let driver = SimDriver::default();
    let mut session = streaming(&driver);
    let image = session.create_image().unwrap();
    image.destroy().unwrap();
    assert_eq!(driver.live_images(), 0);
}
