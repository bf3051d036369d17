//! Building new metadata and reading it back.

mod common;

use cilmeta::metadata::tables::{membermap, methoddef, param, typedef};
use cilmeta::prelude::*;
use common::build_sample;

#[test]
fn members_are_grouped_by_owner() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;

    let types = image.table(TableId::TypeDef).unwrap();
    assert_eq!(types.row_count(), 3);
    assert_eq!(image.type_name(sample.shape)?, "Sample.Shape");
    assert_eq!(image.type_name(sample.circle)?, "Sample.Circle");

    let fields = image.tables().row_count(TableId::Field);
    let methods = image.tables().row_count(TableId::MethodDef);
    assert_eq!(types.list_range(1, typedef::FIELD_LIST, fields), 1..1);
    assert_eq!(types.list_range(2, typedef::FIELD_LIST, fields), 1..2);
    assert_eq!(types.list_range(3, typedef::FIELD_LIST, fields), 2..3);
    assert_eq!(types.list_range(2, typedef::METHOD_LIST, methods), 1..3);
    assert_eq!(types.list_range(3, typedef::METHOD_LIST, methods), 3..5);

    let strings = image.strings().unwrap();
    let method_table = image.table(TableId::MethodDef).unwrap();
    let names = method_table
        .iter()
        .map(|row| row.string(methoddef::NAME, strings).map(str::to_string))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(names, ["Dispose", "get_Name", ".ctor", "Area"]);

    Ok(())
}

#[test]
fn pseudo_tokens_resolve_to_final_rows() -> Result<()> {
    let sample = build_sample()?;
    let metadata = &sample.metadata;

    assert!(sample.constructor.is_pseudo());
    assert_eq!(metadata.resolve(sample.name_field)?, Token::new(0x0400_0001));
    assert_eq!(metadata.resolve(sample.radius_field)?, Token::new(0x0400_0002));
    assert_eq!(metadata.resolve(sample.dispose)?, Token::new(0x0600_0001));
    assert_eq!(metadata.resolve(sample.get_name)?, Token::new(0x0600_0002));
    assert_eq!(metadata.resolve(sample.constructor)?, Token::new(0x0600_0003));
    assert_eq!(metadata.resolve(sample.area)?, Token::new(0x0600_0004));
    assert_eq!(metadata.resolve(sample.radius_param)?, Token::new(0x0800_0001));
    assert_eq!(metadata.resolve(sample.name_property)?, Token::new(0x1700_0001));

    // Type tokens are final from the start
    assert_eq!(metadata.resolve(sample.circle)?, sample.circle);
    Ok(())
}

#[test]
fn params_and_properties_are_linked() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;
    let strings = image.strings().unwrap();

    let methods = image.table(TableId::MethodDef).unwrap();
    let params = image.tables().row_count(TableId::Param);
    assert_eq!(methods.list_range(3, methoddef::PARAM_LIST, params), 1..2);
    assert_eq!(methods.list_range(4, methoddef::PARAM_LIST, params), 2..2);

    let param_row = image.table(TableId::Param).unwrap().get(1).unwrap();
    assert_eq!(param_row.get(param::SEQUENCE), 1);
    assert_eq!(param_row.string(param::NAME, strings)?, "radius");

    let map = image.table(TableId::PropertyMap).unwrap().get(1).unwrap();
    assert_eq!(map.reference(membermap::PARENT), Some(sample.shape));
    assert_eq!(map.get(membermap::LIST), 1);

    let semantics = image.table(TableId::MethodSemantics).unwrap().get(1).unwrap();
    assert_eq!(semantics.cells(), &[0x0002, 2, 0x1700_0001]);

    let signature = image.property_signature(Token::new(0x1700_0001))?;
    assert_eq!(signature.base, TypeSignature::String);
    Ok(())
}

#[test]
fn heaps_and_module() -> Result<()> {
    let sample = build_sample()?;
    let image = MetadataImage::read(sample.metadata.data())?;

    assert_eq!(sample.hello.table(), 0x70);
    let hello = image
        .user_strings()
        .unwrap()
        .get_string(sample.hello.row() as usize)?;
    assert_eq!(hello, "Hello");

    let module = image.table(TableId::Module).unwrap().get(1).unwrap();
    assert_eq!(module.guid(2, image.guids().unwrap())?, Some(common::MVID));

    let signature = image.method_signature(Token::new(0x0600_0003))?;
    assert!(signature.has_this);
    assert_eq!(signature.params[0].base, TypeSignature::R8);
    Ok(())
}

#[test]
fn forward_references_must_be_defined() -> Result<()> {
    let mut builder = MetadataBuilder::new(BuilderOptions::default());
    builder.define_module("Forward.dll", common::MVID)?;
    let program = builder.define_type(TypeAttributes::PUBLIC, "", "Program", None)?;

    let callee = builder.reserve_method()?;
    let caller = builder.define_method(
        program,
        MethodAttributes::STATIC,
        MethodImplAttributes::empty(),
        "Caller",
        &SignatureMethod::new(TypeSignature::Void, vec![]),
    )?;
    builder.define_custom_attribute(caller, callee, &[0x01, 0x00, 0x00, 0x00])?;
    builder.define_reserved_method(
        callee,
        program,
        MethodAttributes::STATIC,
        MethodImplAttributes::empty(),
        "Callee",
        &SignatureMethod::new(TypeSignature::Void, vec![]),
    )?;

    // Rows follow definition order, not reservation order
    let metadata = builder.finalize()?;
    assert_eq!(metadata.resolve(caller)?, Token::new(0x0600_0001));
    assert_eq!(metadata.resolve(callee)?, Token::new(0x0600_0002));

    let image = MetadataImage::read(metadata.data())?;
    let attribute = image.table(TableId::CustomAttribute).unwrap().get(1).unwrap();
    assert_eq!(attribute.cells()[..2], [0x0600_0001, 0x0600_0002]);

    let mut builder = MetadataBuilder::new(BuilderOptions::default());
    builder.define_module("Dangling.dll", common::MVID)?;
    let dangling = builder.reserve_field()?;
    let error = builder.finalize().unwrap_err();
    assert!(matches!(error, Error::UnresolvedPseudoToken(token) if token == dangling));
    assert!(error.is_contract_violation());
    Ok(())
}

#[test]
fn sorted_tables_follow_their_keys() -> Result<()> {
    let mut builder = MetadataBuilder::new(BuilderOptions::default());
    builder.define_module("Generic.dll", common::MVID)?;
    let list = builder.define_type(TypeAttributes::PUBLIC, "", "List`1", None)?;
    let map = builder.define_type(TypeAttributes::PUBLIC, "", "Map`2", None)?;

    // Owners defined out of order
    let value = builder.define_generic_param(map, 1, GenericParamAttributes::empty(), "TValue")?;
    let key = builder.define_generic_param(map, 0, GenericParamAttributes::empty(), "TKey")?;
    let item = builder.define_generic_param(list, 0, GenericParamAttributes::empty(), "T")?;
    builder.define_nested_class(map, list)?;

    let metadata = builder.finalize()?;
    assert_eq!(metadata.resolve(item)?, Token::new(0x2A00_0001));
    assert_eq!(metadata.resolve(key)?, Token::new(0x2A00_0002));
    assert_eq!(metadata.resolve(value)?, Token::new(0x2A00_0003));

    let image = MetadataImage::read(metadata.data())?;
    let params = image.table(TableId::GenericParam).unwrap();
    assert!(params.is_sorted());
    assert_eq!(params.find_by_key(map), 2..4);
    Ok(())
}

#[test]
fn wrong_token_kinds_are_rejected() -> Result<()> {
    let mut builder = MetadataBuilder::new(BuilderOptions::default());
    builder.define_module("Invalid.dll", common::MVID)?;
    let program = builder.define_type(0, "", "Program", None)?;
    let field = builder.define_field(
        program,
        FieldAttributes::STATIC,
        "counter",
        &SignatureField {
            base: TypeSignature::I4,
            ..SignatureField::default()
        },
    )?;

    let error = builder
        .define_method(
            field,
            0,
            MethodImplAttributes::empty(),
            "Misplaced",
            &SignatureMethod::new(TypeSignature::Void, vec![]),
        )
        .unwrap_err();
    assert!(matches!(error, Error::InvalidToken(token) if token == field));

    let missing_type = Token::from_parts(TableId::TypeDef, 9);
    assert!(builder.define_nested_class(missing_type, program).is_err());
    assert!(builder.define_param(program, ParamAttributes::empty(), 1, "x").is_err());
    Ok(())
}

#[test]
fn container_header() -> Result<()> {
    let sample = build_sample()?;
    let header = sample.metadata.cor20_header(0x2050, Some(sample.constructor))?;

    assert_eq!(header.meta_data_rva, 0x2050);
    assert_eq!(header.meta_data_size as usize, sample.metadata.len());
    assert_eq!(header.entry_point(), Some(Token::new(0x0600_0003)));
    Ok(())
}
