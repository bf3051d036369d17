//! A small assembly shared by the integration tests.
//!
//! ```text
//! class Sample.Shape : System.Object, System.IDisposable
//!     string name;
//!     void Dispose();
//!     string Name { get; }
//! class Sample.Circle : Sample.Shape
//!     float64 radius;
//!     .ctor(float64 radius);
//!     float64 Area();
//! ```
//!
//! Circle's members are defined before Shape's, so finalize has to regroup them.

#![allow(dead_code)]

use cilmeta::prelude::*;

pub const MVID: uguid::Guid = uguid::guid!("6f1d2a4c-3b8e-4d7f-9a05-1c2e3f4a5b6c");

pub struct Sample {
    pub metadata: FinishedMetadata,
    pub object: Token,
    pub disposable: Token,
    pub shape: Token,
    pub circle: Token,
    pub name_field: Token,
    pub radius_field: Token,
    pub constructor: Token,
    pub area: Token,
    pub dispose: Token,
    pub get_name: Token,
    pub name_property: Token,
    pub radius_param: Token,
    pub hello: Token,
}

pub fn build_sample() -> Result<Sample> {
    build_sample_with(BuilderOptions::default())
}

pub fn build_sample_with(options: BuilderOptions) -> Result<Sample> {
    let mut builder = MetadataBuilder::new(options);
    builder.define_module("Sample.dll", MVID)?;
    builder.define_assembly("Sample", [1, 0, 0, 0], 0, &[], "")?;
    let corlib = builder.define_assembly_ref(
        "System.Runtime",
        [8, 0, 0, 0],
        0,
        &[0xB0, 0x3F, 0x5F, 0x7F, 0x11, 0xD5, 0x0A, 0x3A],
        "",
    )?;
    let object = builder.define_type_ref(Some(corlib), "System", "Object")?;
    let disposable = builder.define_type_ref(Some(corlib), "System", "IDisposable")?;

    builder.define_type(0, "", "<Module>", None)?;
    let shape = builder.define_type(
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        "Sample",
        "Shape",
        Some(object),
    )?;
    let circle = builder.define_type(TypeAttributes::PUBLIC, "Sample", "Circle", Some(shape))?;
    builder.define_interface_impl(shape, disposable)?;

    let radius_field = builder.define_field(
        circle,
        FieldAttributes::PRIVATE,
        "radius",
        &SignatureField {
            base: TypeSignature::R8,
            ..SignatureField::default()
        },
    )?;
    let constructor = builder.define_method(
        circle,
        MethodAttributes::PUBLIC
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME,
        MethodImplAttributes::empty(),
        ".ctor",
        &SignatureMethod::new(TypeSignature::Void, vec![TypeSignature::R8]).instance(),
    )?;
    let radius_param = builder.define_param(constructor, ParamAttributes::empty(), 1, "radius")?;
    let area = builder.define_method(
        circle,
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
        MethodImplAttributes::empty(),
        "Area",
        &SignatureMethod::new(TypeSignature::R8, vec![]).instance(),
    )?;

    let name_field = builder.define_field(
        shape,
        FieldAttributes::PRIVATE,
        "name",
        &SignatureField {
            base: TypeSignature::String,
            ..SignatureField::default()
        },
    )?;
    let dispose = builder.define_method(
        shape,
        MethodAttributes::PUBLIC | MethodAttributes::VIRTUAL | MethodAttributes::HIDE_BY_SIG,
        MethodImplAttributes::empty(),
        "Dispose",
        &SignatureMethod::new(TypeSignature::Void, vec![]).instance(),
    )?;
    let get_name = builder.define_method(
        shape,
        MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
        MethodImplAttributes::empty(),
        "get_Name",
        &SignatureMethod::new(TypeSignature::String, vec![]).instance(),
    )?;
    let name_property = builder.define_property(
        shape,
        PropertyAttributes::empty(),
        "Name",
        &SignatureProperty {
            has_this: true,
            modifiers: CustomModifiers::default(),
            base: TypeSignature::String,
            params: vec![],
        },
    )?;
    builder.define_method_semantics(name_property, MethodSemanticsAttributes::GETTER, get_name)?;

    let hello = builder.define_user_string("Hello")?;
    let metadata = builder.finalize()?;

    Ok(Sample {
        metadata,
        object,
        disposable,
        shape,
        circle,
        name_field,
        radius_field,
        constructor,
        area,
        dispose,
        get_name,
        name_property,
        radius_param,
        hello,
    })
}
