//! Overload resolution against the hierarchy of a built image.

mod common;

use cilmeta::binder::InMemoryHierarchy;
use cilmeta::prelude::*;
use common::build_sample;

fn candidate(row: u32, declaring_type: Token, param: TypeSignature) -> MethodCandidate {
    MethodCandidate {
        token: Token::from_parts(TableId::MethodDef, row),
        declaring_type,
        params: vec![param],
    }
}

#[test]
fn image_hierarchy() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;

    assert_eq!(image.base_type(sample.circle), Some(sample.shape));
    assert_eq!(image.base_type(sample.shape), Some(sample.object));
    assert_eq!(image.base_type(sample.object), None);
    assert_eq!(image.interfaces(sample.shape), vec![sample.disposable]);
    assert!(image.is_subclass_of(sample.circle, sample.object));
    assert!(image.implements(sample.circle, sample.disposable));
    assert_eq!(image.depth(sample.circle), 2);
    Ok(())
}

#[test]
fn most_specific_class_wins() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;
    let binder = Binder::new(&image);

    let candidates = [
        candidate(1, sample.shape, TypeSignature::Class(sample.disposable)),
        candidate(2, sample.shape, TypeSignature::Class(sample.shape)),
        candidate(3, sample.shape, TypeSignature::Object),
    ];

    let circle = [TypeSignature::Class(sample.circle)];
    let best = binder.select_method(&candidates, &circle)?;
    assert_eq!(best.map(|c| c.token.row()), Some(2));

    let string = [TypeSignature::String];
    let best = binder.select_method(&candidates, &string)?;
    assert_eq!(best.map(|c| c.token.row()), Some(3));

    // Value types are never boxed
    let best = binder.select_method(&candidates, &[TypeSignature::I4])?;
    assert!(best.is_none());
    Ok(())
}

#[test]
fn unrelated_targets_are_ambiguous() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;
    let binder = Binder::new(&image);

    let candidates = [
        candidate(1, sample.shape, TypeSignature::Class(sample.disposable)),
        candidate(2, sample.shape, TypeSignature::Class(sample.object)),
    ];
    let error = binder
        .select_method(&candidates, &[TypeSignature::Class(sample.circle)])
        .unwrap_err();
    assert!(matches!(error, Error::AmbiguousMatch(_)));
    Ok(())
}

#[test]
fn candidates_from_image_signatures() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;
    let binder = Binder::new(&image);

    let constructor = Token::new(0x0600_0003);
    let area = Token::new(0x0600_0004);
    let candidates = [
        MethodCandidate::from_signature(constructor, sample.circle, &image.method_signature(constructor)?),
        MethodCandidate::from_signature(area, sample.circle, &image.method_signature(area)?),
    ];

    // float32 widens to the constructor's float64
    let best = binder.select_method(&candidates, &[TypeSignature::R4])?;
    assert_eq!(best.map(|c| c.token), Some(constructor));

    let best = binder.select_method(&candidates, &[])?;
    assert_eq!(best.map(|c| c.token), Some(area));
    Ok(())
}

#[test]
fn properties_by_type() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;

    let property = Token::new(0x1700_0001);
    let candidates = [PropertyCandidate::from_signature(
        property,
        sample.shape,
        &image.property_signature(property)?,
    )];

    let binder = Binder::new(&image);
    let best = binder.select_property(&candidates, Some(&TypeSignature::String), &[])?;
    assert_eq!(best.map(|p| p.token), Some(property));
    assert!(binder
        .select_property(&candidates, Some(&TypeSignature::I4), &[])?
        .is_none());
    Ok(())
}

#[test]
fn hierarchy_across_images() -> Result<()> {
    let object = Token::new(0x0100_0001);
    let stream = Token::new(0x0100_0002);
    let file_stream = Token::new(0x0200_0002);

    let mut hierarchy = InMemoryHierarchy::new();
    hierarchy.add_type(stream, Some(object), &[]);
    hierarchy.add_type(file_stream, Some(stream), &[]);

    let binder = Binder::new(&hierarchy);
    let candidates = [
        candidate(1, file_stream, TypeSignature::Class(stream)),
        candidate(2, file_stream, TypeSignature::Class(object)),
    ];
    let best = binder.select_method(&candidates, &[TypeSignature::Class(file_stream)])?;
    assert_eq!(best.map(|c| c.token.row()), Some(1));
    Ok(())
}
