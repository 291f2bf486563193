use blackcard_sync::entities::{Product, Project};
use blackcard_sync::form::{join_list, split_list, ProductForm, ProjectForm};
use blackcard_sync::{EntityForm, FieldError};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn split_then_join_is_stable(items in prop::collection::vec("[A-Za-z0-9.#+ ]{0,12}", 0..6)) {
        let raw = items.join(",");
        let once = split_list(&raw);
        prop_assert_eq!(split_list(&join_list(&once)), once.clone());
        prop_assert!(once.iter().all(|item| !item.is_empty() && item.trim() == item));
    }

    #[test]
    fn project_form_round_trips_through_record(
        name in "[A-Za-z][A-Za-z ]{0,16}[A-Za-z]",
        techs in prop::collection::vec("[A-Za-z.]{1,10}", 0..5),
        year in prop::option::of(1990i32..2100),
    ) {
        let project = Project {
            id: "p1".into(),
            name,
            technologies: techs,
            year,
            stats: Some(json!({ "visitors": 120 })),
            ..Default::default()
        };
        let form = ProjectForm::from_record(&project);
        let rebuilt = form.to_record(Some("p1")).unwrap();
        prop_assert_eq!(rebuilt, project);
    }
}

#[test]
fn create_project_transform() {
    let form = ProjectForm {
        name: "Test Site".into(),
        country: "Oman".into(),
        technologies: "React, Node.js".into(),
        stats: r#"{"visitors": 1200}"#.into(),
        year: "2024".into(),
        ..Default::default()
    };
    let project = form.to_record(None).unwrap();
    assert_eq!(project.id, "");
    assert_eq!(project.technologies, vec!["React", "Node.js"]);
    assert_eq!(project.stats, Some(json!({ "visitors": 1200 })));
    assert_eq!(project.year, Some(2024));
    assert_eq!(project.image_url, None);
}

#[test]
fn every_invalid_field_is_reported() {
    let form = ProductForm {
        name: " ".into(),
        price: "abc".into(),
        stock: "1.5".into(),
        ..Default::default()
    };
    let errors = form.to_record(None).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors.get("name"), Some(&FieldError::Required("name")));
    assert!(matches!(
        errors.get("price"),
        Some(FieldError::InvalidNumber { .. })
    ));
    assert!(matches!(
        errors.get("stock"),
        Some(FieldError::InvalidNumber { .. })
    ));
}

#[test]
fn product_price_is_required() {
    let form = ProductForm {
        name: "Black Card".into(),
        ..Default::default()
    };
    let errors = form.to_record(None).unwrap_err();
    assert_eq!(errors.get("price"), Some(&FieldError::Required("price")));

    let form = ProductForm {
        name: "Black Card".into(),
        price: "99.5".into(),
        features: "Lounge access, Concierge".into(),
        ..Default::default()
    };
    let product: Product = form.to_record(Some("x1")).unwrap();
    assert_eq!(product.id, "x1");
    assert_eq!(product.price, 99.5);
    assert_eq!(product.features, vec!["Lounge access", "Concierge"]);
}

#[test]
fn malformed_json_names_the_field() {
    let form = ProjectForm {
        name: "Site".into(),
        stats: "{visitors: 3".into(),
        ..Default::default()
    };
    let errors = form.to_record(None).unwrap_err();
    assert!(matches!(
        errors.get("stats"),
        Some(FieldError::InvalidJson { field: "stats", .. })
    ));
}
