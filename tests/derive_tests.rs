//! `#[derive(Trackable)]` attribute handling, checked through the produced descriptors.

use settings_tracker::{
    MetadataResolver, Property, PropertyRef, TrackError, TrackResult, Trackable, TypeDescriptor,
};

#[derive(Trackable)]
#[trackable(name = "MainWindow")]
#[trackable]
#[trackable(context = "kiosk", false)]
struct Window {
    #[tracking_key]
    id: String,
    width: u32,
    #[trackable(name = "IsMaximized")]
    maximized: bool,
    #[trackable(skip)]
    #[allow(dead_code)]
    handle: usize,
    #[trackable(context = "kiosk")]
    #[trackable(false)]
    theme: String,
}

#[test]
fn test_struct_attributes() {
    let descriptor = Window::describe().unwrap();
    assert_eq!(descriptor.type_name(), "MainWindow");
    assert_eq!(descriptor.class_marker_for(None), Some(true));
    assert_eq!(descriptor.class_marker_for(Some("kiosk")), Some(false));
    assert_eq!(descriptor.class_marker_for(Some("other")), None);
    assert!(!descriptor.is_self_configuring());
    assert!(!descriptor.requests_persistence());
    assert!(!descriptor.has_event_source());
}

#[test]
fn test_field_attributes() {
    let descriptor = Window::describe().unwrap();
    let names = descriptor
        .properties()
        .iter()
        .map(|property| property.name().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Id", "Width", "IsMaximized", "Theme"]);

    assert_eq!(descriptor.key_property().map(|p| p.name()), Some("Id"));
    let theme = descriptor.property("Theme").unwrap();
    assert_eq!(theme.marker_for(None), Some(false));
    assert_eq!(theme.marker_for(Some("kiosk")), Some(true));
}

#[test]
fn test_generated_property_refs() {
    let width: PropertyRef<Window> = Window::WIDTH_PROPERTY;
    assert_eq!(width.name(), "Width");
    assert_eq!(Window::MAXIMIZED_PROPERTY.name(), "IsMaximized");
}

#[test]
fn test_generated_accessors_convert_values() {
    let descriptor = Window::describe().unwrap();
    let mut window = Window {
        id: "main".to_string(),
        width: 1024,
        maximized: false,
        handle: 0,
        theme: "dark".to_string(),
    };

    let width = descriptor.property("Width").unwrap();
    assert_eq!(width.get(&window).unwrap(), serde_json::json!(1024));
    width.set(&mut window, serde_json::json!(1280)).unwrap();
    assert_eq!(window.width, 1280);

    let err = width
        .set(&mut window, serde_json::json!("wide"))
        .unwrap_err();
    assert!(matches!(err, TrackError::TypeMismatch { .. }));
    assert_eq!(window.width, 1280);
}

#[test]
fn test_resolution_per_context() {
    let resolver = MetadataResolver::new();

    let default = resolver.resolve::<Window>(None).unwrap();
    assert_eq!(default.key_property_name.as_deref(), Some("Id"));
    assert_eq!(default.trackable_property_names, vec!["Width", "IsMaximized"]);

    let kiosk = resolver.resolve::<Window>(Some("kiosk")).unwrap();
    assert_eq!(kiosk.trackable_property_names, vec!["Theme"]);

    // Repeated calls are served from the cache.
    let again = resolver.resolve::<Window>(None).unwrap();
    assert_eq!(again, default);
    assert_eq!(resolver.resolutions(), 2);
}

#[derive(Trackable)]
struct Unmarked {
    plain: u32,
    #[trackable]
    opted_in: u32,
}

#[test]
fn test_unmarked_struct_defaults_to_not_trackable() {
    let metadata = MetadataResolver::new().resolve::<Unmarked>(None).unwrap();
    assert_eq!(metadata.key_property_name, None);
    assert_eq!(metadata.trackable_property_names, vec!["OptedIn"]);

    let value = Unmarked {
        plain: 1,
        opted_in: 2,
    };
    assert_eq!(value.plain + value.opted_in, 3);
}

struct TwoKeys {
    a: u32,
    b: u32,
}

impl Trackable for TwoKeys {
    fn describe() -> TrackResult<TypeDescriptor<Self>> {
        TypeDescriptor::builder("TwoKeys")
            .property(Property::new("A", |t: &TwoKeys| &t.a, |t, v| t.a = v).key())
            .property(Property::new("B", |t: &TwoKeys| &t.b, |t, v| t.b = v).key())
            .build()
    }
}

#[test]
fn test_more_than_one_key_fails_fast() {
    let err = MetadataResolver::new().resolve::<TwoKeys>(None).unwrap_err();
    assert_eq!(
        err,
        TrackError::AmbiguousKey {
            type_name: "TwoKeys".to_string(),
            properties: vec!["A".to_string(), "B".to_string()],
        }
    );
}

#[derive(Trackable)]
#[trackable]
struct Token {
    r#type: String,
    expires_in: u64,
}

#[test]
fn test_raw_identifiers_use_their_bare_names() {
    assert_eq!(Token::TYPE_PROPERTY.name(), "Type");
    assert_eq!(Token::EXPIRES_IN_PROPERTY.name(), "ExpiresIn");

    let metadata = MetadataResolver::new().resolve::<Token>(None).unwrap();
    assert_eq!(metadata.trackable_property_names, vec!["Type", "ExpiresIn"]);

    let token = Token {
        r#type: "bearer".to_string(),
        expires_in: 3600,
    };
    let descriptor = Token::describe().unwrap();
    assert_eq!(
        descriptor.property("Type").unwrap().get(&token).unwrap(),
        serde_json::json!("bearer")
    );
    assert_eq!(token.expires_in, 3600);
}
