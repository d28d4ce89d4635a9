//! Contract tests run against every adapter variant.

use editkit_core::testing::{recording_registry, EngineCall, EngineControl};
use editkit_core::{
    AdapterError, AdapterFactory, AdapterType, Container, EditorAdapter, ShapeKind, ShapeParams,
    SnapshotId, SourceType, TextStyle,
};

fn initialized(adapter_type: AdapterType) -> (Box<dyn EditorAdapter>, EngineControl) {
    let (registry, control) = recording_registry(adapter_type);
    let mut adapter = AdapterFactory::new(registry).create_adapter(adapter_type);
    adapter
        .initialize(Container::new("editor", 800, 600))
        .expect("initialize should succeed");
    (adapter, control)
}

fn assert_not_initialized(adapter: &mut dyn EditorAdapter) {
    assert!(matches!(
        adapter.load_image("a.png"),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(
        adapter.to_data_url("image/png", 1.0),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(
        adapter.set_brightness(0.5),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(
        adapter.apply_filter("grayscale"),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(adapter.rotate(90.0), Err(AdapterError::NotInitialized)));
    assert!(matches!(
        adapter.set_scale(1.0, 1.0),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(
        adapter.set_position(0.0, 0.0),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(
        adapter.add_text("hi", &TextStyle::default()),
        Err(AdapterError::NotInitialized)
    ));
    assert!(matches!(adapter.stop_drawing(), Err(AdapterError::NotInitialized)));
    assert!(matches!(adapter.save_state(), Err(AdapterError::NotInitialized)));
    assert!(matches!(
        adapter.restore_state(SnapshotId::new()),
        Err(AdapterError::NotInitialized)
    ));
}

#[test]
fn test_operations_fail_before_initialize() {
    for adapter_type in AdapterType::ALL {
        let (registry, control) = recording_registry(adapter_type);
        let mut adapter = AdapterFactory::new(registry).create_adapter(adapter_type);
        assert_not_initialized(adapter.as_mut());
        assert!(control.calls().is_empty());
    }
}

#[test]
fn test_operations_fail_after_destroy() {
    for adapter_type in AdapterType::ALL {
        let (mut adapter, control) = initialized(adapter_type);
        adapter.load_image("photo.png").expect("load");
        adapter.destroy();
        adapter.destroy();

        assert_not_initialized(adapter.as_mut());
        assert_eq!(control.release_count(), 1);
        assert!(adapter.original_image_data().is_none());
    }
}

#[test]
fn test_destroyed_session_can_be_reinitialized() {
    let (mut adapter, control) = initialized(AdapterType::Cropper);
    let old_lifetime = adapter.lifetime();
    adapter.destroy();

    adapter
        .initialize(Container::new("editor", 400, 300))
        .expect("re-initialize after destroy");
    assert!(!old_lifetime.is_alive());
    assert!(adapter.lifetime().is_alive());
    assert_eq!(control.construct_count(), 2);
}

#[test]
fn test_double_initialize_leaves_state_unchanged() {
    for adapter_type in AdapterType::ALL {
        let (mut adapter, control) = initialized(adapter_type);
        adapter.load_image("photo.png").expect("load");

        let err = adapter
            .initialize(Container::new("other", 10, 10))
            .expect_err("second initialize must fail");
        assert!(matches!(err, AdapterError::AlreadyInitialized));
        assert_eq!(control.construct_count(), 1);
        assert_eq!(
            adapter.session().container().map(|c| c.id.as_str()),
            Some("editor")
        );
        assert_eq!(
            adapter.original_image_data().map(|r| r.src.as_str()),
            Some("photo.png")
        );
    }
}

#[test]
fn test_load_image_records_engine_size() {
    let (mut adapter, control) = initialized(AdapterType::ImageEditor);
    control.set_load_size(1024, 768);

    let record = adapter
        .load_image("data:image/png;base64,AAAA")
        .expect("load");
    assert_eq!((record.width, record.height), (1024, 768));
    assert_eq!(record.source_type, SourceType::DataUri);
    assert!(matches!(
        adapter.load_image("  "),
        Err(AdapterError::InvalidInput(_))
    ));
    assert_eq!(
        adapter.original_image_data().map(|r| r.width),
        Some(1024)
    );
}

#[test]
fn test_save_then_restore_reproduces_source() {
    for adapter_type in AdapterType::ALL {
        let (mut adapter, control) = initialized(adapter_type);
        adapter.load_image("first.png").expect("load");
        let id = adapter.save_state().expect("save");

        adapter.load_image("second.png").expect("load");
        adapter.restore_state(id).expect("restore");

        assert_eq!(
            adapter.original_image_data().map(|r| r.src.as_str()),
            Some("first.png")
        );
        assert_eq!(
            control.last_call(),
            Some(EngineCall::Load("first.png".to_string()))
        );
    }
}

#[test]
fn test_restore_unknown_id() {
    let (mut adapter, _control) = initialized(AdapterType::Scene2d);
    adapter.load_image("a.png").expect("load");
    let missing = SnapshotId::new();
    let err = adapter.restore_state(missing).expect_err("unknown id");
    assert!(matches!(err, AdapterError::StateNotFound(id) if id == missing));
}

#[test]
fn test_unsupported_mime_falls_back_to_png() {
    for adapter_type in AdapterType::ALL {
        let (adapter, control) = initialized(adapter_type);
        let url = adapter
            .to_data_url("image/invalid", 0.9)
            .expect("fallback export succeeds");

        assert!(url.starts_with("data:image/png;base64,"), "{adapter_type}: {url}");
        match control.last_call() {
            Some(EngineCall::Export { format, quality }) => {
                assert!(format.ends_with("png"), "{adapter_type}: {format}");
                assert_eq!(quality, 90);
            }
            other => panic!("{adapter_type}: expected export, got {other:?}"),
        }
    }
}

#[test]
fn test_format_refused_by_engine_falls_back_to_png() {
    let (adapter, control) = initialized(AdapterType::CanvasObject);
    control.refuse_format("webp");

    let blob = adapter.to_blob("image/webp", 0.9).expect("fallback export");
    assert_eq!(blob.mime, "image/png");
    assert_eq!(
        control.last_call(),
        Some(EngineCall::Export {
            format: "png".to_string(),
            quality: 90
        })
    );

    let jpeg = adapter.to_blob("image/jpeg", 0.5).expect("native export");
    assert_eq!(jpeg.mime, "image/jpeg");
}

#[test]
fn test_brightness_clamped_into_native_range() {
    let (mut adapter, control) = initialized(AdapterType::Raster);
    adapter.set_brightness(2.5).expect("clamped");
    assert_eq!(control.last_call(), Some(EngineCall::Brightness(100.0)));
    assert!(matches!(
        adapter.set_brightness(f64::NAN),
        Err(AdapterError::InvalidInput(_))
    ));
}

#[test]
fn test_objects_get_engine_handles() {
    let (mut adapter, _control) = initialized(AdapterType::CanvasObject);
    let text = adapter
        .add_text("caption", &TextStyle::default())
        .expect("text");
    let shape = adapter
        .add_shape(&ShapeParams {
            kind: ShapeKind::Rect,
            x: 0.0,
            y: 0.0,
            width: 20.0,
            height: 10.0,
            stroke: "#ff0000".to_string(),
            fill: None,
        })
        .expect("shape");
    assert_ne!(text, shape);
}

#[test]
fn test_engine_fault_passes_through() {
    let (mut adapter, control) = initialized(AdapterType::ImageEditor);
    control.fail_next(editkit_core::EngineFault::new("filter exploded"));
    let err = adapter.apply_filter("blur").expect_err("fault");
    assert_eq!(
        err.engine_fault().map(editkit_core::EngineFault::message),
        Some("filter exploded")
    );
    assert!(!err.is_contract_violation());
}

#[test]
fn test_non_finite_shape_bounds_rejected() {
    let (mut adapter, control) = initialized(AdapterType::Raster);
    let shape = |width: f64, height: f64| ShapeParams {
        kind: ShapeKind::Line,
        x: 0.0,
        y: 0.0,
        width,
        height,
        stroke: "#000000".to_string(),
        fill: None,
    };

    let mut overflowing = shape(f64::MAX, 1.0);
    overflowing.x = f64::MAX;

    for bad in [shape(f64::INFINITY, 1.0), shape(1.0, f64::NAN), overflowing] {
        assert!(matches!(
            adapter.add_shape(&bad),
            Err(AdapterError::InvalidInput(_))
        ));
    }
    assert!(!control
        .calls()
        .iter()
        .any(|call| matches!(call, EngineCall::AddShape(_))));
    adapter.add_shape(&shape(1e9, 1e9)).expect("large but finite");
}
