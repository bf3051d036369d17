use rustc_hash::FxHashMap;
use strum::IntoEnumIterator;

use crate::{
    builder::tokens::{PseudoTokens, TokenMap},
    metadata::{
        cor20header::Cor20Header,
        signatures::{
            encode_field_signature, encode_method_signature, encode_method_spec_signature,
            encode_property_signature, encode_stand_alone_signature, encode_type_spec_signature,
            SignatureField, SignatureMethod, SignatureMethodSpec, SignatureProperty,
            SignatureTypeSpec, StandAloneSignature, TypeSignature,
        },
        tables::{
            methoddef, param, typedef, CodedIndexType, ColumnKind, EventAttributes,
            GenericParamAttributes, MethodImplAttributes, MethodSemanticsAttributes,
            ParamAttributes, PropertyAttributes, TableBuilder, TableId, TABLE_SLOTS,
        },
        token::Token,
        writer::{MetadataWriter, WriterOptions},
    },
    Error, Result,
};

/// `AssemblyHashAlgorithm.SHA1`
const HASH_ALGORITHM_SHA1: u32 = 0x8004;

/// Build configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Options for the final layout
    pub writer: WriterOptions,
    /// Keep the final row counts, which a Portable PDB for this build needs
    pub capture_row_counts: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            writer: WriterOptions::default(),
            capture_row_counts: true,
        }
    }
}

impl BuilderOptions {
    /// Set the layout options
    #[must_use]
    pub fn with_writer_options(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }

    /// Set whether the final row counts are kept
    #[must_use]
    pub fn with_capture_row_counts(mut self, capture: bool) -> Self {
        self.capture_row_counts = capture;
        self
    }
}

/// A row whose position is decided at finalize
#[derive(Clone, Debug)]
struct Member {
    token: Token,
    owner: Token,
    cells: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
struct Members {
    rows: Vec<Member>,
    index: FxHashMap<Token, usize>,
}

impl Members {
    fn push(&mut self, token: Token, owner: Token, cells: Vec<u32>) {
        self.index.insert(token, self.rows.len());
        self.rows.push(Member { token, owner, cells });
    }

    fn contains(&self, token: Token) -> bool {
        self.index.contains_key(&token)
    }

    fn get_mut(&mut self, token: Token) -> Option<&mut Member> {
        let index = *self.index.get(&token)?;
        self.rows.get_mut(index)
    }

    fn take(&mut self) -> Vec<Member> {
        self.index.clear();
        std::mem::take(&mut self.rows)
    }
}

/// One build session: define calls in any order, then [`MetadataBuilder::finalize`].
///
/// TypeDef, TypeRef, TypeSpec, MemberRef and the other rows nothing needs to move get their final
/// token when they are defined. Field, MethodDef, Param, Property, Event, GenericParam,
/// InterfaceImpl and GenericParamConstraint rows only get their position at finalize: member
/// lists have to be contiguous per owner and the last three tables are sorted. Until then they
/// are named by pseudo-tokens, which may be used anywhere a token is accepted.
///
/// The first type defined should be `<Module>`.
///
/// # Examples
///
/// ```rust
/// use cilmeta::builder::{BuilderOptions, MetadataBuilder};
/// use cilmeta::metadata::{
///     signatures::{SignatureMethod, TypeSignature},
///     tables::{MethodAttributes, MethodImplAttributes, TypeAttributes},
/// };
///
/// let mut builder = MetadataBuilder::new(BuilderOptions::default());
/// builder.define_module("demo.dll", uguid::guid!("01234567-89ab-cdef-0123-456789abcdef"))?;
/// builder.define_type(0, "", "<Module>", None)?;
/// let program = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Program", None)?;
/// let main = builder.define_method(
///     program,
///     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
///     MethodImplAttributes::empty(),
///     "Main",
///     &SignatureMethod::new(TypeSignature::Void, vec![]),
/// )?;
/// assert!(main.is_pseudo());
///
/// let metadata = builder.finalize()?;
/// assert_eq!(metadata.resolve(main)?.value(), 0x0600_0001);
/// # Ok::<(), cilmeta::Error>(())
/// ```
#[derive(Debug)]
pub struct MetadataBuilder {
    options: BuilderOptions,
    writer: MetadataWriter,
    pseudo: PseudoTokens,
    fields: Members,
    methods: Members,
    params: Members,
    properties: Members,
    events: Members,
    // Pseudo-tokens of sorted rows with the row each was pushed at
    generic_params: Vec<(Token, u32)>,
    interface_impls: Vec<(Token, u32)>,
    constraints: Vec<(Token, u32)>,
}

impl MetadataBuilder {
    /// Start a new session
    #[must_use]
    pub fn new(options: BuilderOptions) -> Self {
        let writer = MetadataWriter::new(options.writer.clone());
        MetadataBuilder {
            options,
            writer,
            pseudo: PseudoTokens::new(),
            fields: Members::default(),
            methods: Members::default(),
            params: Members::default(),
            properties: Members::default(),
            events: Members::default(),
            generic_params: Vec::new(),
            interface_impls: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// The session options
    #[must_use]
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// The pseudo-tokens issued so far
    #[must_use]
    pub fn pseudo_tokens(&self) -> &PseudoTokens {
        &self.pseudo
    }

    /// Heaps and tables directly, for rows without a define call. Cells written this way must
    /// already hold final values.
    pub fn writer_mut(&mut self) -> &mut MetadataWriter {
        &mut self.writer
    }

    /// Rows of `table` so far. Tables laid out at finalize count 0 until then.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.writer.table(table).map_or(0, TableBuilder::row_count)
    }

    fn table_of(&self, token: Token) -> Option<TableId> {
        if token.is_pseudo() {
            self.pseudo.table(token)
        } else {
            token.table_id()
        }
    }

    fn exists(&self, token: Token) -> bool {
        if token.is_pseudo() {
            return self.pseudo.table(token).is_some();
        }
        token
            .table_id()
            .is_some_and(|table| token.row() >= 1 && token.row() <= self.row_count(table))
    }

    /// Cell value for a column referencing one table
    fn table_cell(&self, token: Token, table: TableId) -> Result<u32> {
        if self.table_of(token) != Some(table) || !self.exists(token) {
            return Err(Error::InvalidToken(token));
        }
        Ok(if token.is_pseudo() {
            token.value()
        } else {
            token.row()
        })
    }

    /// Cell value for a coded-index column
    fn coded_cell(&self, token: Token, coded: CodedIndexType) -> Result<u32> {
        match self.table_of(token) {
            Some(table) if coded.tag_of(table).is_some() && self.exists(token) => Ok(token.value()),
            _ => Err(Error::InvalidToken(token)),
        }
    }

    fn optional_coded_cell(&self, token: Option<Token>, coded: CodedIndexType) -> Result<u32> {
        token.map_or(Ok(0), |token| self.coded_cell(token, coded))
    }

    fn push(&mut self, table: TableId, cells: &[u32]) -> Result<Token> {
        let rid = self.writer.table_mut(table).push(cells)?;
        Ok(Token::from_parts(table, rid))
    }

    fn string(&mut self, value: &str) -> Result<u32> {
        self.writer.strings_mut().add(value)
    }

    fn blob(&mut self, value: &[u8]) -> Result<u32> {
        self.writer.blobs_mut().add(value)
    }

    /// Define the single `Module` row.
    ///
    /// # Errors
    /// Returns an error if the module is already defined or a heap is full.
    pub fn define_module(&mut self, name: &str, mvid: uguid::Guid) -> Result<Token> {
        if self.row_count(TableId::Module) > 0 {
            return Err(malformed_error!("The module is already defined"));
        }
        let name = self.string(name)?;
        let mvid = self.writer.guids_mut().add(mvid)?;
        self.push(TableId::Module, &[0, name, mvid, 0, 0])
    }

    /// Define the single `Assembly` row, hashed with SHA-1.
    ///
    /// # Errors
    /// Returns an error if the assembly is already defined or a heap is full.
    pub fn define_assembly(
        &mut self,
        name: &str,
        version: [u16; 4],
        flags: u32,
        public_key: &[u8],
        culture: &str,
    ) -> Result<Token> {
        if self.row_count(TableId::Assembly) > 0 {
            return Err(malformed_error!("The assembly is already defined"));
        }
        let public_key = self.blob(public_key)?;
        let name = self.string(name)?;
        let culture = self.string(culture)?;
        let [major, minor, build, revision] = version.map(u32::from);
        self.push(
            TableId::Assembly,
            &[HASH_ALGORITHM_SHA1, major, minor, build, revision, flags, public_key, name, culture],
        )
    }

    /// Define a reference to another assembly.
    ///
    /// # Errors
    /// Returns an error if a heap or the table is full.
    pub fn define_assembly_ref(
        &mut self,
        name: &str,
        version: [u16; 4],
        flags: u32,
        public_key_or_token: &[u8],
        culture: &str,
    ) -> Result<Token> {
        let public_key_or_token = self.blob(public_key_or_token)?;
        let name = self.string(name)?;
        let culture = self.string(culture)?;
        let [major, minor, build, revision] = version.map(u32::from);
        self.push(
            TableId::AssemblyRef,
            &[major, minor, build, revision, flags, public_key_or_token, name, culture, 0],
        )
    }

    /// Define a reference to another module.
    ///
    /// # Errors
    /// Returns an error if a heap or the table is full.
    pub fn define_module_ref(&mut self, name: &str) -> Result<Token> {
        let name = self.string(name)?;
        self.push(TableId::ModuleRef, &[name])
    }

    /// Define a type reference resolved through `scope` (Module, ModuleRef, AssemblyRef or an
    /// enclosing TypeRef), `None` for an exported type.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a scope of the wrong table.
    pub fn define_type_ref(&mut self, scope: Option<Token>, namespace: &str, name: &str) -> Result<Token> {
        let scope = self.optional_coded_cell(scope, CodedIndexType::ResolutionScope)?;
        let name = self.string(name)?;
        let namespace = self.string(namespace)?;
        self.push(TableId::TypeRef, &[scope, name, namespace])
    }

    /// Define a type. Its field and method lists are filled in at finalize.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a base type that is not a TypeDef, TypeRef or TypeSpec.
    pub fn define_type(
        &mut self,
        flags: u32,
        namespace: &str,
        name: &str,
        extends: Option<Token>,
    ) -> Result<Token> {
        let extends = self.optional_coded_cell(extends, CodedIndexType::TypeDefOrRef)?;
        let name = self.string(name)?;
        let namespace = self.string(namespace)?;
        self.push(TableId::TypeDef, &[flags, name, namespace, extends, 0, 0])
    }

    /// Set the base type of `type_def`, for a base defined after the type.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is of the wrong table.
    pub fn set_base_type(&mut self, type_def: Token, extends: Token) -> Result<()> {
        let rid = self.table_cell(type_def, TableId::TypeDef)?;
        let extends = self.coded_cell(extends, CodedIndexType::TypeDefOrRef)?;
        if let Some(row) = self.writer.table_mut(TableId::TypeDef).get_mut(rid) {
            row[typedef::EXTENDS] = extends;
        }
        Ok(())
    }

    /// Define a constructed type.
    ///
    /// # Errors
    /// Returns an error if the signature cannot be encoded.
    pub fn define_type_spec(&mut self, signature: &TypeSignature) -> Result<Token> {
        let blob = encode_type_spec_signature(&SignatureTypeSpec {
            base: signature.clone(),
        })?;
        let blob = self.blob(&blob)?;
        self.push(TableId::TypeSpec, &[blob])
    }

    /// Issue a pseudo-token for a method defined later with
    /// [`MetadataBuilder::define_reserved_method`].
    ///
    /// # Errors
    /// Returns [`Error::LimitExceeded`] once the pseudo-token space is used up.
    pub fn reserve_method(&mut self) -> Result<Token> {
        self.pseudo.allocate(TableId::MethodDef)
    }

    /// Issue a pseudo-token for a field defined later with
    /// [`MetadataBuilder::define_reserved_field`].
    ///
    /// # Errors
    /// Returns [`Error::LimitExceeded`] once the pseudo-token space is used up.
    pub fn reserve_field(&mut self) -> Result<Token> {
        self.pseudo.allocate(TableId::Field)
    }

    /// Define a field of `owner`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `owner` is not a defined type.
    pub fn define_field(
        &mut self,
        owner: Token,
        flags: u32,
        name: &str,
        signature: &SignatureField,
    ) -> Result<Token> {
        let token = self.reserve_field()?;
        self.define_reserved_field(token, owner, flags, name, signature)?;
        Ok(token)
    }

    /// Define the field `reserved` stands for.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `reserved` is not a reserved field or `owner` not a
    /// defined type, [`Error::DuplicateFixup`] if the field is already defined.
    pub fn define_reserved_field(
        &mut self,
        reserved: Token,
        owner: Token,
        flags: u32,
        name: &str,
        signature: &SignatureField,
    ) -> Result<()> {
        if self.pseudo.table(reserved) != Some(TableId::Field) {
            return Err(Error::InvalidToken(reserved));
        }
        if self.fields.contains(reserved) {
            return Err(Error::DuplicateFixup(reserved));
        }
        self.table_cell(owner, TableId::TypeDef)?;

        let name = self.string(name)?;
        let signature = self.blob(&encode_field_signature(signature)?)?;
        self.fields.push(reserved, owner, vec![flags, name, signature]);
        Ok(())
    }

    /// Define a method of `owner`. Its RVA starts as 0, see [`MetadataBuilder::set_method_rva`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `owner` is not a defined type.
    pub fn define_method(
        &mut self,
        owner: Token,
        flags: u32,
        impl_flags: MethodImplAttributes,
        name: &str,
        signature: &SignatureMethod,
    ) -> Result<Token> {
        let token = self.reserve_method()?;
        self.define_reserved_method(token, owner, flags, impl_flags, name, signature)?;
        Ok(token)
    }

    /// Define the method `reserved` stands for.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `reserved` is not a reserved method or `owner` not a
    /// defined type, [`Error::DuplicateFixup`] if the method is already defined.
    pub fn define_reserved_method(
        &mut self,
        reserved: Token,
        owner: Token,
        flags: u32,
        impl_flags: MethodImplAttributes,
        name: &str,
        signature: &SignatureMethod,
    ) -> Result<()> {
        if self.pseudo.table(reserved) != Some(TableId::MethodDef) {
            return Err(Error::InvalidToken(reserved));
        }
        if self.methods.contains(reserved) {
            return Err(Error::DuplicateFixup(reserved));
        }
        self.table_cell(owner, TableId::TypeDef)?;

        let name = self.string(name)?;
        let signature = self.blob(&encode_method_signature(signature)?)?;
        let impl_flags = u32::from(impl_flags.bits());
        self.methods
            .push(reserved, owner, vec![0, impl_flags, flags, name, signature, 0]);
        Ok(())
    }

    /// Set the RVA of a method body placed by the container.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `method` is not a defined method.
    pub fn set_method_rva(&mut self, method: Token, rva: u32) -> Result<()> {
        let Some(member) = self.methods.get_mut(method) else {
            return Err(Error::InvalidToken(method));
        };
        member.cells[methoddef::RVA] = rva;
        Ok(())
    }

    /// Define a parameter of `method`; sequence 0 is the return value.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `method` is not a method of this build.
    pub fn define_param(
        &mut self,
        method: Token,
        flags: ParamAttributes,
        sequence: u16,
        name: &str,
    ) -> Result<Token> {
        if !method.is_pseudo() || self.pseudo.table(method) != Some(TableId::MethodDef) {
            return Err(Error::InvalidToken(method));
        }

        let name = self.string(name)?;
        let token = self.pseudo.allocate(TableId::Param)?;
        self.params.push(
            token,
            method,
            vec![u32::from(flags.bits()), u32::from(sequence), name],
        );
        Ok(token)
    }

    /// Define a property of `owner`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `owner` is not a defined type.
    pub fn define_property(
        &mut self,
        owner: Token,
        flags: PropertyAttributes,
        name: &str,
        signature: &SignatureProperty,
    ) -> Result<Token> {
        self.table_cell(owner, TableId::TypeDef)?;
        let name = self.string(name)?;
        let signature = self.blob(&encode_property_signature(signature)?)?;
        let token = self.pseudo.allocate(TableId::Property)?;
        self.properties
            .push(token, owner, vec![u32::from(flags.bits()), name, signature]);
        Ok(token)
    }

    /// Define an event of `owner` whose delegate type is `event_type`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `owner` is not a defined type or `event_type` not a
    /// type.
    pub fn define_event(
        &mut self,
        owner: Token,
        flags: EventAttributes,
        name: &str,
        event_type: Token,
    ) -> Result<Token> {
        self.table_cell(owner, TableId::TypeDef)?;
        let event_type = self.coded_cell(event_type, CodedIndexType::TypeDefOrRef)?;
        let name = self.string(name)?;
        let token = self.pseudo.allocate(TableId::Event)?;
        self.events
            .push(token, owner, vec![u32::from(flags.bits()), name, event_type]);
        Ok(token)
    }

    fn define_member_ref(&mut self, parent: Token, name: &str, signature: &[u8]) -> Result<Token> {
        let parent = self.coded_cell(parent, CodedIndexType::MemberRefParent)?;
        let name = self.string(name)?;
        let signature = self.blob(signature)?;
        self.push(TableId::MemberRef, &[parent, name, signature])
    }

    /// Define a reference to a method of `parent` (TypeDef, TypeRef, ModuleRef, TypeSpec, or a
    /// MethodDef for a vararg call site).
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a parent of the wrong table.
    pub fn define_method_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: &SignatureMethod,
    ) -> Result<Token> {
        let signature = encode_method_signature(signature)?;
        self.define_member_ref(parent, name, &signature)
    }

    /// Define a reference to a field of `parent`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a parent of the wrong table.
    pub fn define_field_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: &SignatureField,
    ) -> Result<Token> {
        let signature = encode_field_signature(signature)?;
        self.define_member_ref(parent, name, &signature)
    }

    /// Define an instantiation of the generic method `method`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `method` is not a MethodDef or MemberRef.
    pub fn define_method_spec(
        &mut self,
        method: Token,
        instantiation: &SignatureMethodSpec,
    ) -> Result<Token> {
        let method = self.coded_cell(method, CodedIndexType::MethodDefOrRef)?;
        let instantiation = self.blob(&encode_method_spec_signature(instantiation)?)?;
        self.push(TableId::MethodSpec, &[method, instantiation])
    }

    /// Define a stand-alone signature, e.g. the locals of a method body.
    ///
    /// # Errors
    /// Returns an error if the signature cannot be encoded.
    pub fn define_stand_alone_sig(&mut self, signature: &StandAloneSignature) -> Result<Token> {
        let blob = self.blob(&encode_stand_alone_signature(signature)?)?;
        self.push(TableId::StandAloneSig, &[blob])
    }

    /// Add a `#US` entry and return its `ldstr` token.
    ///
    /// # Errors
    /// Returns [`Error::LimitExceeded`] once the heap is full.
    pub fn define_user_string(&mut self, value: &str) -> Result<Token> {
        let offset = self.writer.user_strings_mut().add(value)?;
        Ok(Token::user_string(offset))
    }

    /// Record that `class` implements `interface`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is of the wrong table.
    pub fn define_interface_impl(&mut self, class: Token, interface: Token) -> Result<Token> {
        let class = self.table_cell(class, TableId::TypeDef)?;
        let interface = self.coded_cell(interface, CodedIndexType::TypeDefOrRef)?;
        let rid = self
            .writer
            .table_mut(TableId::InterfaceImpl)
            .push(&[class, interface])?;

        let token = self.pseudo.allocate(TableId::InterfaceImpl)?;
        self.interface_impls.push((token, rid));
        Ok(token)
    }

    /// Record that `nested` is declared inside `enclosing`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is not a defined type.
    pub fn define_nested_class(&mut self, nested: Token, enclosing: Token) -> Result<()> {
        let nested = self.table_cell(nested, TableId::TypeDef)?;
        let enclosing = self.table_cell(enclosing, TableId::TypeDef)?;
        self.push(TableId::NestedClass, &[nested, enclosing])?;
        Ok(())
    }

    /// Define generic parameter `number` of a type or method.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `owner` is neither a type nor a method.
    pub fn define_generic_param(
        &mut self,
        owner: Token,
        number: u16,
        flags: GenericParamAttributes,
        name: &str,
    ) -> Result<Token> {
        let owner = self.coded_cell(owner, CodedIndexType::TypeOrMethodDef)?;
        let name = self.string(name)?;
        let rid = self.writer.table_mut(TableId::GenericParam).push(&[
            u32::from(number),
            u32::from(flags.bits()),
            owner,
            name,
        ])?;

        let token = self.pseudo.allocate(TableId::GenericParam)?;
        self.generic_params.push((token, rid));
        Ok(token)
    }

    /// Constrain the generic parameter `param` to `constraint`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is of the wrong table.
    pub fn define_generic_param_constraint(&mut self, param: Token, constraint: Token) -> Result<Token> {
        let param = self.table_cell(param, TableId::GenericParam)?;
        let constraint = self.coded_cell(constraint, CodedIndexType::TypeDefOrRef)?;
        let rid = self
            .writer
            .table_mut(TableId::GenericParamConstraint)
            .push(&[param, constraint])?;

        let token = self.pseudo.allocate(TableId::GenericParamConstraint)?;
        self.constraints.push((token, rid));
        Ok(token)
    }

    /// Attach a custom attribute, constructed by `constructor` (a MethodDef or MemberRef), to
    /// `parent`. `value` is the encoded attribute blob.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is of the wrong table.
    pub fn define_custom_attribute(&mut self, parent: Token, constructor: Token, value: &[u8]) -> Result<()> {
        let parent = self.coded_cell(parent, CodedIndexType::HasCustomAttribute)?;
        let constructor = self.coded_cell(constructor, CodedIndexType::CustomAttributeType)?;
        let value = self.blob(value)?;
        self.push(TableId::CustomAttribute, &[parent, constructor, value])?;
        Ok(())
    }

    /// Give a field, parameter or property a default value of `element_type`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `parent` cannot have a constant.
    pub fn define_constant(&mut self, parent: Token, element_type: u8, value: &[u8]) -> Result<()> {
        let parent = self.coded_cell(parent, CodedIndexType::HasConstant)?;
        let value = self.blob(value)?;
        self.push(TableId::Constant, &[u32::from(element_type), 0, parent, value])?;
        Ok(())
    }

    /// Bind `method` as accessor of the property or event `association`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if either token is of the wrong table.
    pub fn define_method_semantics(
        &mut self,
        association: Token,
        semantics: MethodSemanticsAttributes,
        method: Token,
    ) -> Result<()> {
        let association = self.coded_cell(association, CodedIndexType::HasSemantics)?;
        let method = self.table_cell(method, TableId::MethodDef)?;
        self.push(
            TableId::MethodSemantics,
            &[u32::from(semantics.bits()), method, association],
        )?;
        Ok(())
    }

    /// Record that `body` implements `declaration` in `class`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if a token is of the wrong table.
    pub fn define_method_impl(&mut self, class: Token, body: Token, declaration: Token) -> Result<()> {
        let class = self.table_cell(class, TableId::TypeDef)?;
        let body = self.coded_cell(body, CodedIndexType::MethodDefOrRef)?;
        let declaration = self.coded_cell(declaration, CodedIndexType::MethodDefOrRef)?;
        self.push(TableId::MethodImpl, &[class, body, declaration])?;
        Ok(())
    }

    /// Give `parent` an explicit packing and size.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `parent` is not a defined type.
    pub fn define_class_layout(&mut self, parent: Token, packing_size: u16, class_size: u32) -> Result<()> {
        let parent = self.table_cell(parent, TableId::TypeDef)?;
        self.push(TableId::ClassLayout, &[u32::from(packing_size), class_size, parent])?;
        Ok(())
    }

    /// Place the initial data of `field` at `rva`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `field` is not a field of this build.
    pub fn define_field_rva(&mut self, field: Token, rva: u32) -> Result<()> {
        let field = self.table_cell(field, TableId::Field)?;
        self.push(TableId::FieldRVA, &[rva, field])?;
        Ok(())
    }

    /// Lay out the members, resolve every pseudo-token and encode the metadata.
    ///
    /// 1. fields, methods, parameters, properties and events are grouped by owner and receive
    ///    their final rows; the owners' list columns and the property/event maps are filled in
    /// 2. generic parameters, interface implementations and constraints are sorted, in that order,
    ///    and receive their final rows
    /// 3. every pseudo-token ever issued must have a final token by now
    /// 4. every table cell holding a pseudo-token is replaced by its final value
    /// 5. the remaining sorted tables are sorted and the layout is written
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] if a reserved member was never defined, and the
    /// errors of [`MetadataWriter::write`].
    pub fn finalize(mut self) -> Result<FinishedMetadata> {
        let mut fixups = TokenMap::new();
        let types = self.row_count(TableId::TypeDef);

        // 1. members
        let first = lay_out(
            self.fields.take(),
            self.writer.table_mut(TableId::Field),
            &mut fixups,
            |member| (member.owner.row(), 0),
        )?;
        let field_lists = member_lists(&first, types, self.row_count(TableId::Field));

        let first = lay_out(
            self.methods.take(),
            self.writer.table_mut(TableId::MethodDef),
            &mut fixups,
            |member| (member.owner.row(), 0),
        )?;
        let method_lists = member_lists(&first, types, self.row_count(TableId::MethodDef));

        let type_table = self.writer.table_mut(TableId::TypeDef);
        for (rid, (fields, methods)) in (1..).zip(field_lists.iter().zip(&method_lists)) {
            if let Some(row) = type_table.get_mut(rid) {
                row[typedef::FIELD_LIST] = *fields;
                row[typedef::METHOD_LIST] = *methods;
            }
        }

        let mut params = self.params.take();
        for member in &mut params {
            member.owner = fixups.resolve(member.owner)?;
        }
        let first = lay_out(
            params,
            self.writer.table_mut(TableId::Param),
            &mut fixups,
            |member| (member.owner.row(), member.cells[param::SEQUENCE]),
        )?;
        let methods = self.row_count(TableId::MethodDef);
        let param_lists = member_lists(&first, methods, self.row_count(TableId::Param));
        let method_table = self.writer.table_mut(TableId::MethodDef);
        for (rid, params) in (1..).zip(&param_lists) {
            if let Some(row) = method_table.get_mut(rid) {
                row[methoddef::PARAM_LIST] = *params;
            }
        }

        for (members, table, map) in [
            (self.properties.take(), TableId::Property, TableId::PropertyMap),
            (self.events.take(), TableId::Event, TableId::EventMap),
        ] {
            let first = lay_out(members, self.writer.table_mut(table), &mut fixups, |member| {
                (member.owner.row(), 0)
            })?;
            let map_table = self.writer.table_mut(map);
            for rid in 1..=types {
                if let Some(list) = first.get(&rid) {
                    map_table.push(&[rid, *list])?;
                }
            }
        }

        // 2. sorted tables with pseudo rows
        for (table, tokens) in [
            (TableId::GenericParam, std::mem::take(&mut self.generic_params)),
            (TableId::InterfaceImpl, std::mem::take(&mut self.interface_impls)),
            (
                TableId::GenericParamConstraint,
                std::mem::take(&mut self.constraints),
            ),
        ] {
            let builder = self.writer.table_mut(table);
            resolve_cells(builder, &fixups)?;
            // Rows pushed through `writer_mut` move too, so map by pushed row
            let moved = builder.sort();
            for (pseudo, pushed) in tokens {
                let Some(rid) = moved.get(pushed as usize - 1) else {
                    return Err(Error::UnresolvedPseudoToken(pseudo));
                };
                fixups.register(pseudo, Token::from_parts(table, *rid))?;
            }
        }

        // 3. completeness
        for (pseudo, table) in self.pseudo.iter() {
            if fixups.get(pseudo).is_none() {
                log::debug!("{:?} of {} was reserved but never defined", pseudo, table);
                return Err(Error::UnresolvedPseudoToken(pseudo));
            }
        }

        // 4. resolution, 5. order
        for builder in self.writer.tables_mut() {
            resolve_cells(builder, &fixups)?;
            builder.sort();
        }

        let row_counts = self.options.capture_row_counts.then(|| {
            let mut counts = [0u32; TABLE_SLOTS];
            for table in TableId::iter() {
                counts[table as usize] = self.row_count(table);
            }
            counts
        });

        log::debug!(
            "resolved {} pseudo-tokens over {} types",
            fixups.len(),
            types
        );
        let data = self.writer.write()?;

        Ok(FinishedMetadata {
            data,
            tokens: fixups,
            row_counts,
        })
    }
}

/// Push `members` grouped by `key` into `table` and register their final tokens. Returns the
/// first row of each owner.
fn lay_out(
    mut members: Vec<Member>,
    table: &mut TableBuilder,
    fixups: &mut TokenMap,
    key: impl Fn(&Member) -> (u32, u32),
) -> Result<FxHashMap<u32, u32>> {
    members.sort_by_key(&key);

    let mut first = FxHashMap::default();
    for member in &members {
        let rid = table.push(&member.cells)?;
        fixups.register(member.token, Token::from_parts(table.id(), rid))?;
        first.entry(key(member).0).or_insert(rid);
    }

    log::debug!("laid out {} {} rows", members.len(), table.id());
    Ok(first)
}

/// List column values for `owners` owners: an owner without members points at the next owner's
/// first row, or past the end.
fn member_lists(first: &FxHashMap<u32, u32>, owners: u32, rows: u32) -> Vec<u32> {
    let mut lists = vec![0u32; owners as usize];
    let mut next = rows + 1;
    for owner in (1..=owners).rev() {
        if let Some(rid) = first.get(&owner) {
            next = *rid;
        }
        lists[owner as usize - 1] = next;
    }
    lists
}

/// Replace every pseudo-token in the reference cells of `table` by its final value.
fn resolve_cells(table: &mut TableBuilder, fixups: &TokenMap) -> Result<()> {
    for (kind, cell) in table.references_mut() {
        let token = Token::new(*cell);
        if !token.is_pseudo() {
            continue;
        }

        let resolved = fixups.resolve(token)?;
        *cell = match kind {
            ColumnKind::Table(expected) => {
                if resolved.table_id() != Some(expected) {
                    return Err(Error::InvalidToken(token));
                }
                resolved.row()
            }
            _ => resolved.value(),
        };
    }
    Ok(())
}

/// The result of a build: the metadata blob and the fixups that produced it.
#[derive(Clone, Debug)]
pub struct FinishedMetadata {
    data: Vec<u8>,
    tokens: TokenMap,
    row_counts: Option<[u32; TABLE_SLOTS]>,
}

impl FinishedMetadata {
    /// The metadata blob, starting with `BSJB`
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the blob, recorded in the CLI header
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` for an empty blob, which a finished build never produces
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pseudo-token fixups
    #[must_use]
    pub fn token_map(&self) -> &TokenMap {
        &self.tokens
    }

    /// The final token of `token`.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] for a pseudo-token of another build.
    pub fn resolve(&self, token: Token) -> Result<Token> {
        self.tokens.resolve(token)
    }

    /// Final row count of every table, if the build kept them
    #[must_use]
    pub fn row_counts(&self) -> Option<&[u32; TABLE_SLOTS]> {
        self.row_counts.as_ref()
    }

    /// The CLI header for this metadata mapped at `rva`.
    ///
    /// # Errors
    /// Returns an error if the entry point does not resolve or the blob exceeds 4 GiB.
    pub fn cor20_header(&self, rva: u32, entry_point: Option<Token>) -> Result<Cor20Header> {
        let entry_point = entry_point.map(|token| self.resolve(token)).transpose()?;
        let Ok(size) = u32::try_from(self.data.len()) else {
            return Err(limit_error!("metadata size", self.data.len(), u32::MAX));
        };
        Ok(Cor20Header::for_metadata(rva, size, entry_point))
    }

    /// Take the blob
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        image::MetadataImage,
        signatures::SignatureProperty,
        tables::{
            genericparam, membermap, FieldAttributes, MethodAttributes, TypeAttributes,
        },
    };

    const MVID: uguid::Guid = uguid::guid!("01234567-89ab-cdef-0123-456789abcdef");

    fn session() -> (MetadataBuilder, Token) {
        let mut builder = MetadataBuilder::new(BuilderOptions::default());
        builder.define_module("test.dll", MVID).unwrap();
        let module = builder.define_type(0, "", "<Module>", None).unwrap();
        (builder, module)
    }

    fn void_method() -> SignatureMethod {
        SignatureMethod::new(TypeSignature::Void, vec![])
    }

    fn int_field() -> SignatureField {
        SignatureField {
            modifiers: Default::default(),
            base: TypeSignature::I4,
        }
    }

    fn no_pseudo_cells(image: &MetadataImage<'_>) -> bool {
        image
            .tables()
            .tables()
            .all(|table| table.iter().all(|row| row.cells().iter().all(|cell| cell & 0x8000_0000 == 0)))
    }

    #[test]
    fn members_grouped_by_owner() {
        let (mut builder, _) = session();
        let first = builder.define_type(TypeAttributes::PUBLIC, "Demo", "First", None).unwrap();
        let second = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Second", None).unwrap();

        let a = builder.define_method(first, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "A", &void_method()).unwrap();
        let b = builder.define_method(second, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "B", &void_method()).unwrap();
        let c = builder.define_method(first, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "C", &void_method()).unwrap();
        let field = builder.define_field(second, FieldAttributes::PRIVATE, "value", &int_field()).unwrap();

        let metadata = builder.finalize().unwrap();
        assert_eq!(metadata.resolve(a).unwrap(), Token::new(0x0600_0001));
        assert_eq!(metadata.resolve(c).unwrap(), Token::new(0x0600_0002));
        assert_eq!(metadata.resolve(b).unwrap(), Token::new(0x0600_0003));
        assert_eq!(metadata.resolve(field).unwrap(), Token::new(0x0400_0001));

        let image = MetadataImage::read(metadata.data()).unwrap();
        let types = image.table(TableId::TypeDef).unwrap();
        let lists: Vec<(u32, u32)> = types
            .iter()
            .map(|row| (row.get(typedef::FIELD_LIST), row.get(typedef::METHOD_LIST)))
            .collect();
        assert_eq!(lists, vec![(1, 1), (1, 1), (1, 3)]);
        assert_eq!(types.list_range(2, typedef::METHOD_LIST, 3), 1..3);
        assert_eq!(types.list_range(3, typedef::FIELD_LIST, 1), 1..2);

        let methods = image.table(TableId::MethodDef).unwrap();
        let strings = image.strings().unwrap();
        let names: Vec<&str> = methods
            .iter()
            .map(|row| row.string(methoddef::NAME, strings).unwrap())
            .collect();
        assert_eq!(names, vec!["A", "C", "B"]);
        assert!(no_pseudo_cells(&image));
    }

    #[test]
    fn params_follow_their_method() {
        let (mut builder, _) = session();
        let class = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Math", None).unwrap();
        let signature = SignatureMethod::new(
            TypeSignature::I4,
            vec![TypeSignature::I4, TypeSignature::I4],
        );
        let add = builder.define_method(class, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "Add", &signature).unwrap();
        let neg = builder.define_method(class, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "Neg", &signature).unwrap();

        builder.define_param(neg, ParamAttributes::empty(), 1, "x").unwrap();
        builder.define_param(add, ParamAttributes::empty(), 2, "b").unwrap();
        builder.define_param(add, ParamAttributes::empty(), 1, "a").unwrap();
        builder.set_method_rva(add, 0x2050).unwrap();

        let metadata = builder.finalize().unwrap();
        let image = MetadataImage::read(metadata.data()).unwrap();
        let strings = image.strings().unwrap();

        let params = image.table(TableId::Param).unwrap();
        let names: Vec<&str> = params.iter().map(|row| row.string(param::NAME, strings).unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "x"]);

        let methods = image.table(TableId::MethodDef).unwrap();
        assert_eq!(methods.get(1).unwrap().get(methoddef::RVA), 0x2050);
        assert_eq!(methods.list_range(1, methoddef::PARAM_LIST, 3), 1..3);
        assert_eq!(methods.list_range(2, methoddef::PARAM_LIST, 3), 3..4);
    }

    #[test]
    fn forward_reference() {
        let (mut builder, _) = session();
        let class = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Widget", None).unwrap();
        let getter = builder.reserve_method().unwrap();

        let property = builder
            .define_property(
                class,
                PropertyAttributes::empty(),
                "Size",
                &SignatureProperty {
                    has_this: true,
                    modifiers: Default::default(),
                    base: TypeSignature::I4,
                    params: vec![],
                },
            )
            .unwrap();
        builder.define_method_semantics(property, MethodSemanticsAttributes::GETTER, getter).unwrap();
        builder.define_custom_attribute(class, getter, &[0x01, 0x00, 0x00, 0x00]).unwrap();

        builder.define_method(class, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "Other", &void_method()).unwrap();
        builder
            .define_reserved_method(getter, class, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "get_Size", &void_method())
            .unwrap();
        assert!(matches!(
            builder.define_reserved_method(getter, class, 0, MethodImplAttributes::empty(), "again", &void_method()),
            Err(Error::DuplicateFixup(_))
        ));

        let metadata = builder.finalize().unwrap();
        let getter = metadata.resolve(getter).unwrap();
        assert_eq!(getter, Token::new(0x0600_0002));

        let image = MetadataImage::read(metadata.data()).unwrap();
        let semantics = image.table(TableId::MethodSemantics).unwrap().get(1).unwrap();
        assert_eq!(semantics.reference(1), Some(getter));
        assert_eq!(semantics.reference(2), Some(Token::new(0x1700_0001)));

        let attribute = image.table(TableId::CustomAttribute).unwrap().get(1).unwrap();
        assert_eq!(attribute.reference(1), Some(getter));

        let map = image.table(TableId::PropertyMap).unwrap().get(1).unwrap();
        assert_eq!(map.get(membermap::PARENT), 2);
        assert_eq!(map.get(membermap::LIST), 1);
        assert!(no_pseudo_cells(&image));
    }

    #[test]
    fn undefined_reservation_fails() {
        let (mut builder, module) = session();
        let missing = builder.reserve_method().unwrap();
        builder.define_custom_attribute(module, missing, &[0x01, 0x00, 0x00, 0x00]).unwrap();

        let error = builder.finalize().unwrap_err();
        assert!(matches!(error, Error::UnresolvedPseudoToken(token) if token == missing));
        assert!(error.is_contract_violation());
    }

    #[test]
    fn generic_params_sorted_by_owner() {
        let (mut builder, _) = session();
        let class = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Box`1", None).unwrap();
        let method = builder.define_method(class, MethodAttributes::PUBLIC, MethodImplAttributes::empty(), "Map", &void_method()).unwrap();

        let u = builder.define_generic_param(method, 0, GenericParamAttributes::empty(), "U").unwrap();
        let t = builder.define_generic_param(class, 0, GenericParamAttributes::empty(), "T").unwrap();
        builder.define_generic_param_constraint(u, class).unwrap();
        builder.define_generic_param_constraint(t, class).unwrap();

        // TypeOrMethodDef packs MethodDef 1 as 3 and TypeDef 2 as 4
        let metadata = builder.finalize().unwrap();
        assert_eq!(metadata.resolve(u).unwrap(), Token::new(0x2A00_0001));
        assert_eq!(metadata.resolve(t).unwrap(), Token::new(0x2A00_0002));

        let image = MetadataImage::read(metadata.data()).unwrap();
        let params = image.table(TableId::GenericParam).unwrap();
        assert!(params.is_sorted());
        assert_eq!(params.get(1).unwrap().reference(genericparam::OWNER), Some(Token::new(0x0600_0001)));
        assert_eq!(params.get(2).unwrap().reference(genericparam::OWNER), Some(class));

        let constraints = image.table(TableId::GenericParamConstraint).unwrap();
        let owners: Vec<u32> = constraints.iter().map(|row| row.get(0)).collect();
        assert_eq!(owners, vec![1, 2]);
    }

    #[test]
    fn interface_impls_sorted() {
        let (mut builder, _) = session();
        let first = builder.define_type(TypeAttributes::PUBLIC, "Demo", "First", None).unwrap();
        let second = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Second", None).unwrap();
        let disposable = builder.define_type_ref(None, "System", "IDisposable").unwrap();

        let attribute = builder.define_type_ref(None, "Demo", "MarkerAttribute").unwrap();
        let constructor = builder.define_method_ref(attribute, ".ctor", &void_method().instance()).unwrap();

        let late = builder.define_interface_impl(second, disposable).unwrap();
        let early = builder.define_interface_impl(first, disposable).unwrap();
        builder.define_custom_attribute(late, constructor, &[0x01, 0x00, 0x00, 0x00]).unwrap();
        assert!(matches!(
            builder.define_custom_attribute(late, disposable, &[]),
            Err(Error::InvalidToken(_))
        ));

        let metadata = builder.finalize().unwrap();
        assert_eq!(metadata.resolve(early).unwrap(), Token::new(0x0900_0001));
        assert_eq!(metadata.resolve(late).unwrap(), Token::new(0x0900_0002));

        let image = MetadataImage::read(metadata.data()).unwrap();
        let row = image.table(TableId::CustomAttribute).unwrap().get(1).unwrap();
        assert_eq!(row.reference(0), Some(Token::new(0x0900_0002)));
        assert_eq!(row.reference(1), Some(constructor));
    }

    #[test]
    fn direct_rows_between_defined_rows() {
        let (mut builder, _) = session();
        let first = builder.define_type(TypeAttributes::PUBLIC, "Demo", "First", None).unwrap();
        let second = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Second", None).unwrap();
        let third = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Third", None).unwrap();
        let disposable = builder.define_type_ref(None, "System", "IDisposable").unwrap();

        builder
            .writer_mut()
            .table_mut(TableId::InterfaceImpl)
            .push(&[second.row(), disposable.value()])
            .unwrap();
        let early = builder.define_interface_impl(first, disposable).unwrap();
        builder
            .writer_mut()
            .table_mut(TableId::InterfaceImpl)
            .push(&[second.row(), disposable.value()])
            .unwrap();
        let late = builder.define_interface_impl(third, disposable).unwrap();

        let metadata = builder.finalize().unwrap();
        assert_eq!(metadata.resolve(early).unwrap(), Token::new(0x0900_0001));
        assert_eq!(metadata.resolve(late).unwrap(), Token::new(0x0900_0004));

        let image = MetadataImage::read(metadata.data()).unwrap();
        let impls = image.table(TableId::InterfaceImpl).unwrap();
        let classes: Vec<u32> = impls.iter().map(|row| row.get(0)).collect();
        assert_eq!(classes, vec![first.row(), second.row(), second.row(), third.row()]);
        for token in [early, late] {
            let row = impls.get(metadata.resolve(token).unwrap().row()).unwrap();
            assert_eq!(row.reference(1), Some(disposable));
        }
        assert_eq!(impls.get(1).unwrap().reference(0), Some(first));
        assert_eq!(impls.get(4).unwrap().reference(0), Some(third));
    }

    #[test]
    fn invalid_tokens() {
        let (mut builder, module) = session();
        let type_ref = builder.define_type_ref(None, "System", "Object").unwrap();

        assert!(matches!(
            builder.define_field(type_ref, 0, "x", &int_field()),
            Err(Error::InvalidToken(_))
        ));
        assert!(matches!(
            builder.define_type(0, "Demo", "Bad", Some(Token::new(0x0100_0009))),
            Err(Error::InvalidToken(_))
        ));
        assert!(matches!(
            builder.define_param(module, ParamAttributes::empty(), 1, "x"),
            Err(Error::InvalidToken(_))
        ));
        let field = builder.reserve_field().unwrap();
        assert!(matches!(
            builder.define_reserved_method(field, module, 0, MethodImplAttributes::empty(), "m", &void_method()),
            Err(Error::InvalidToken(_))
        ));
        assert!(builder.define_module("again.dll", MVID).is_err());
    }

    #[test]
    fn cor20_header() {
        let (mut builder, module) = session();
        let main = builder.define_method(module, MethodAttributes::STATIC, MethodImplAttributes::empty(), "Main", &void_method()).unwrap();
        let metadata = builder.finalize().unwrap();

        let header = metadata.cor20_header(0x2000, Some(main)).unwrap();
        assert_eq!(header.meta_data_rva, 0x2000);
        assert_eq!(header.meta_data_size as usize, metadata.len());
        assert_eq!(header.entry_point(), Some(Token::new(0x0600_0001)));

        let counts = metadata.row_counts().unwrap();
        assert_eq!(counts[TableId::MethodDef as usize], 1);
        assert_eq!(counts[TableId::TypeDef as usize], 1);
    }
}
