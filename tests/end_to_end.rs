use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::object::InMemDicomObject;
use dicom::object::mem::InMemElement;
use dicom_dictionary_std::tags;
use dicom_viewport::render::{FrameRenderer, GpuRenderer, VolumeRenderer};
use dicom_viewport::tools::page_by_distance;
use dicom_viewport::{
    Camera, DatasetLoader, MouseButton, RendererKind, SortBy, Vec3, ViewType, Viewer,
    ViewerConfig, ViewerError, Viewport, resolver,
};

const PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE: Tag = Tag(0x5200, 0x9230);
const PLANE_POSITION_SEQUENCE: Tag = Tag(0x0020, 0x9113);

fn ds(tag: Tag, values: &[f64]) -> InMemElement {
    DataElement::new(
        tag,
        VR::DS,
        PrimitiveValue::Strs(values.iter().map(|v| v.to_string()).collect()),
    )
}

fn us(tag: Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

fn text(tag: Tag, vr: VR, value: &str) -> InMemElement {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

fn pixel_data(samples: impl IntoIterator<Item = i16>) -> InMemElement {
    let bytes: Vec<u8> = samples.into_iter().flat_map(i16::to_le_bytes).collect();
    DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(bytes))
}

fn monochrome16(uid: &str, rows: u16, columns: u16) -> Vec<InMemElement> {
    vec![
        text(tags::SOP_INSTANCE_UID, VR::UI, uid),
        us(tags::ROWS, rows),
        us(tags::COLUMNS, columns),
        us(tags::BITS_ALLOCATED, 16),
        us(tags::PIXEL_REPRESENTATION, 1),
        text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
        ds(tags::IMAGE_ORIENTATION_PATIENT, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ds(tags::PIXEL_SPACING, &[1.0, 1.0]),
    ]
}

/// One multi-frame instance of 1x1 frames with a plane position per frame.
fn two_frame_instance() -> InMemDicomObject {
    let per_frame = [0.0, 5.0]
        .iter()
        .map(|z| {
            let position = InMemDicomObject::from_element_iter([ds(
                tags::IMAGE_POSITION_PATIENT,
                &[0.0, 0.0, *z],
            )]);
            InMemDicomObject::from_element_iter([DataElement::new(
                PLANE_POSITION_SEQUENCE,
                VR::SQ,
                DataSetSequence::from(vec![position]),
            )])
        })
        .collect::<Vec<_>>();

    let mut elements = monochrome16("1.2.3.4", 1, 1);
    elements.push(text(tags::NUMBER_OF_FRAMES, VR::IS, "2"));
    elements.push(pixel_data([0, 10]));
    elements.push(DataElement::new(
        PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(per_frame),
    ));
    InMemDicomObject::from_element_iter(elements)
}

/// Single-frame axial slices, `spacing` mm apart. Slice `k` pixel `i`
/// holds `k * 50 + i`.
fn axial_series(count: usize, spacing: f64, columns: u16, rows: u16) -> Vec<InMemDicomObject> {
    (0..count)
        .map(|k| {
            let mut elements = monochrome16(&format!("2.25.{}", k + 1), rows, columns);
            elements.push(ds(tags::IMAGE_POSITION_PATIENT, &[-10.0, 4.0, k as f64 * spacing]));
            elements.push(text(tags::INSTANCE_NUMBER, VR::IS, &(count - k).to_string()));
            elements.push(pixel_data(
                (0..rows as i16 * columns as i16).map(|i| k as i16 * 50 + i),
            ));
            InMemDicomObject::from_element_iter(elements)
        })
        .collect()
}

#[test]
fn two_frame_instance_pages_between_frames() {
    let dataset = DatasetLoader::load_from_instances(&[two_frame_instance()], SortBy::Identifier)
        .expect("should load the instance");
    let frames = dataset.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].id, "1.2.3.4.0");
    assert_eq!(frames[1].id, "1.2.3.4.1");
    assert_eq!(frames[0].image_normal, Vec3::Z);
    assert_eq!(frames[0].image_center, Vec3::new(0.0, 0.0, 0.0));
    assert_eq!(frames[1].image_center, Vec3::new(0.0, 0.0, 5.0));

    let mut camera = Camera::from_frame(&frames[0]);
    assert_eq!(resolver::find_frame_index(&dataset, &camera).unwrap(), 0);

    let start = camera.look_point();
    page_by_distance(&mut camera, &dataset, start, 5.0, false);
    assert_eq!(resolver::find_frame_index(&dataset, &camera).unwrap(), 1);
    assert_eq!(resolver::find_frame(&dataset, &camera).unwrap().id, "1.2.3.4.1");
}

#[test]
fn sort_orders_change_frame_order() {
    let series = axial_series(3, 2.0, 2, 2);
    let by_uid = DatasetLoader::load_from_instances(&series, SortBy::Identifier).unwrap();
    let by_number = DatasetLoader::load_from_instances(&series, SortBy::InstanceNumber).unwrap();

    let z = |dataset: &dicom_viewport::Dataset| {
        dataset
            .frames()
            .iter()
            .map(|f| f.image_position.z)
            .collect::<Vec<_>>()
    };
    assert_eq!(z(&by_uid), vec![0.0, 2.0, 4.0]);
    assert_eq!(z(&by_number), vec![4.0, 2.0, 0.0]);
    assert!(by_uid.is_3d());
    assert!(by_number.is_3d());
}

#[test]
fn frame_and_volume_renderers_agree_on_frames() {
    let series = axial_series(4, 1.5, 6, 4);
    let dataset = DatasetLoader::load_from_instances(&series, SortBy::Identifier).unwrap();
    let mut frame_renderer = FrameRenderer::new();
    let mut volume_renderer = VolumeRenderer::new();

    for (index, frame) in dataset.frames().iter().enumerate() {
        // Heights of 4 and 8 give unit and double zoom.
        for height in [4, 8] {
            let mut viewport = Viewport::new(16, height, Camera::from_frame(frame));
            viewport.set_window(100, 220);
            let expected = frame_renderer.render(&dataset, &viewport).unwrap();
            let actual = volume_renderer.render(&dataset, &viewport).unwrap();
            assert_eq!(actual, expected, "frame {index} height {height}");
        }
    }
}

#[test]
fn oblique_camera_cannot_show_a_stored_frame() {
    let series = axial_series(3, 1.0, 4, 4);
    let dataset = DatasetLoader::load_from_instances(&series, SortBy::Identifier).unwrap();
    let frame = &dataset.frames()[1];
    let look = frame.image_center;
    let camera = Camera::new(
        look - Vec3::new(0.0, 0.3, 1.0).normalize(),
        look,
        Vec3::new(0.0, 1.0, -0.3).normalize(),
        4.0,
    );
    let viewport = Viewport::new(8, 8, camera);

    assert!(matches!(
        FrameRenderer::new().render(&dataset, &viewport),
        Err(ViewerError::UnsupportedOperation(_))
    ));
    // The volume renderer resamples the same plane.
    assert!(VolumeRenderer::new().render(&dataset, &viewport).is_ok());
}

#[tokio::test]
async fn viewer_rotates_a_volume() {
    let series = axial_series(4, 1.0, 8, 8);
    let dataset = DatasetLoader::load_from_instances(&series, SortBy::Identifier).unwrap();
    let config = ViewerConfig::default()
        .with_renderer(RendererKind::Volume)
        .with_initial_view(ViewType::Coronal);
    let mut viewer = Viewer::with_config(dataset, 32, 32, config).await;
    assert_eq!(viewer.renderer(), RendererKind::Volume);
    assert_eq!(viewer.view_type(), ViewType::Coronal);
    let coronal = viewer.render().unwrap().clone();

    viewer
        .toolbox_mut()
        .select_tool(MouseButton::Right, dicom_viewport::MouseTool::Rotate)
        .unwrap();
    viewer.pointer_down(MouseButton::Right, (16.0, 16.0)).unwrap();
    viewer.pointer_move((24.0, 12.0)).unwrap();
    viewer.pointer_up(MouseButton::Right);

    assert_eq!(viewer.view_type(), ViewType::Oblique);
    let oblique = viewer.render().unwrap();
    assert_eq!(oblique.dimensions(), (32, 32));
    assert_ne!(*oblique, coronal);
}

#[tokio::test]
async fn gpu_renderer_matches_frame_renderer() {
    let mut gpu = match GpuRenderer::create().await {
        Ok(renderer) => renderer,
        Err(ViewerError::BackendUnavailable(reason)) => {
            eprintln!("no GPU available: {reason}");
            return;
        }
        Err(err) => panic!("unexpected error: {err}"),
    };

    let series = axial_series(3, 1.0, 7, 5);
    let dataset = DatasetLoader::load_from_instances(&series, SortBy::Identifier).unwrap();
    for frame in dataset.frames() {
        for (zoom, pan) in [(1.0, (0.0, 0.0)), (0.6, (0.2, 0.1)), (2.3, (-0.3, 0.05))] {
            let mut viewport = Viewport::new(21, 13, Camera::from_frame(frame));
            viewport.set_zoom(zoom);
            viewport.set_pan(pan.0, pan.1);
            viewport.set_window(60, 90);
            let expected = FrameRenderer::new().render(&dataset, &viewport).unwrap();
            let actual = gpu.render(&dataset, &viewport).unwrap();
            assert_eq!(actual.dimensions(), expected.dimensions());
            // Shader float math may round a window step differently.
            let worst = actual
                .as_raw()
                .iter()
                .zip(expected.as_raw())
                .map(|(a, e)| a.abs_diff(*e))
                .max()
                .unwrap_or(0);
            assert!(worst <= 1, "frame {} zoom {zoom} differs by {worst}", frame.id);
        }
    }
}
