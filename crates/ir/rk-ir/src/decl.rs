//! Declarations

use crate::{Body, TypeRef};
use bitflags::bitflags;
use rk_intern::{Interner, Symbol};
use rk_span::{FileId, FileSpan};

/// A parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// File the declarations were parsed from
    pub file: FileId,
    /// Top-level declarations in source order
    pub decls: Vec<Decl>,
}

impl SourceFile {
    /// Creates an empty file
    #[must_use]
    pub fn new(file: FileId) -> Self {
        Self {
            file,
            decls: Vec::new(),
        }
    }

    /// Declarations of the container named by `path`; the empty path is the
    /// file itself
    #[must_use]
    pub fn container(&self, path: &DeclPath) -> Option<&[Decl]> {
        let mut decls = self.decls.as_slice();
        for segment in &path.segments {
            let class = decls.iter().find_map(|decl| match decl {
                Decl::Class(class) if class.name == *segment => Some(class),
                _ => None,
            })?;
            decls = &class.members;
        }
        Some(decls)
    }

    /// Mutable declarations of the container named by `path`
    pub fn container_mut(&mut self, path: &DeclPath) -> Option<&mut Vec<Decl>> {
        let mut decls = &mut self.decls;
        for segment in &path.segments {
            let class = decls.iter_mut().find_map(|decl| match decl {
                Decl::Class(class) if class.name == *segment => Some(class),
                _ => None,
            })?;
            decls = &mut class.members;
        }
        Some(decls)
    }

    /// Class named by `path`
    #[must_use]
    pub fn class(&self, path: &DeclPath) -> Option<&ClassDecl> {
        let (last, parent) = path.split_last()?;
        self.container(&parent)?.iter().find_map(|decl| match decl {
            Decl::Class(class) if class.name == last => Some(class),
            _ => None,
        })
    }

    /// Visits every function of the file, including members of nested
    /// classes, together with the path of its container
    pub fn for_each_function<'a>(&'a self, mut f: impl FnMut(&DeclPath, &'a FunctionDecl)) {
        fn walk<'a>(
            decls: &'a [Decl],
            path: &mut DeclPath,
            f: &mut impl FnMut(&DeclPath, &'a FunctionDecl),
        ) {
            for decl in decls {
                match decl {
                    Decl::Function(function) => f(path, function),
                    Decl::Class(class) => {
                        path.segments.push(class.name);
                        walk(&class.members, path, f);
                        path.segments.pop();
                    }
                    Decl::Property(_) | Decl::TypeAlias(_) => {}
                }
            }
        }
        walk(&self.decls, &mut DeclPath::root(), &mut f);
    }
}

/// Names of the classes enclosing a declaration, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclPath {
    /// Path segments
    pub segments: Vec<Symbol>,
}

impl DeclPath {
    /// The file level
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a member named `name` inside this container
    #[must_use]
    pub fn child(&self, name: Symbol) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name);
        Self { segments }
    }

    /// Last segment and the path of its parent
    #[must_use]
    pub fn split_last(&self) -> Option<(Symbol, Self)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            *last,
            Self {
                segments: parent.to_vec(),
            },
        ))
    }

    /// Whether this is the file level
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Dotted rendering such as `Outer.Inner`
    #[must_use]
    pub fn display(&self, interner: &Interner) -> String {
        self.segments
            .iter()
            .map(|segment| interner.resolve(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// `class`, `object` or `interface`
    Class(ClassDecl),
    /// `fun`
    Function(FunctionDecl),
    /// `val` / `var`
    Property(PropertyDecl),
    /// `typealias`
    TypeAlias(TypeAliasDecl),
}

impl Decl {
    /// Declared name
    #[must_use]
    pub fn name(&self) -> Symbol {
        match self {
            Self::Class(class) => class.name,
            Self::Function(function) => function.name,
            Self::Property(property) => property.name,
            Self::TypeAlias(alias) => alias.name,
        }
    }

    /// Annotations on the declaration
    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        match self {
            Self::Class(class) => &class.annotations,
            Self::Function(function) => &function.annotations,
            Self::Property(property) => &property.annotations,
            Self::TypeAlias(alias) => &alias.annotations,
        }
    }

    /// Source location
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Class(class) => class.span,
            Self::Function(function) => function.span,
            Self::Property(property) => property.span,
            Self::TypeAlias(alias) => alias.span,
        }
    }

    /// Replaces every synthetic span in the declaration with `anchor`
    pub fn relocate(&mut self, anchor: FileSpan) {
        match self {
            Self::Class(class) => class.relocate(anchor),
            Self::Function(function) => function.relocate(anchor),
            Self::Property(property) => property.relocate(anchor),
            Self::TypeAlias(alias) => {
                relocate_span(&mut alias.span, anchor);
                alias.target.relocate(anchor);
            }
        }
    }
}

pub(crate) fn relocate_span(span: &mut FileSpan, anchor: FileSpan) {
    if span.file.is_synthetic() {
        *span = anchor;
    }
}

bitflags! {
    /// Declaration modifiers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        /// `data`
        const DATA = 1 << 0;
        /// `sealed`
        const SEALED = 1 << 1;
        /// `enum`
        const ENUM = 1 << 2;
        /// `annotation`
        const ANNOTATION = 1 << 3;
        /// `companion`
        const COMPANION = 1 << 4;
        /// `inline`
        const INLINE = 1 << 5;
        /// `open`
        const OPEN = 1 << 6;
        /// `abstract`
        const ABSTRACT = 1 << 7;
        /// `override`
        const OVERRIDE = 1 << 8;
        /// `private`
        const PRIVATE = 1 << 9;
        /// `internal`
        const INTERNAL = 1 << 10;
        /// `public`
        const PUBLIC = 1 << 11;
        /// `inner`
        const INNER = 1 << 12;
        /// `infix`
        const INFIX = 1 << 13;
        /// `vararg`
        const VARARG = 1 << 14;
        /// `operator`
        const OPERATOR = 1 << 15;
    }
}

impl Modifiers {
    /// Modifier for a soft keyword spelling
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "data" => Self::DATA,
            "sealed" => Self::SEALED,
            "enum" => Self::ENUM,
            "annotation" => Self::ANNOTATION,
            "companion" => Self::COMPANION,
            "inline" => Self::INLINE,
            "open" => Self::OPEN,
            "abstract" => Self::ABSTRACT,
            "override" => Self::OVERRIDE,
            "private" => Self::PRIVATE,
            "internal" => Self::INTERNAL,
            "public" => Self::PUBLIC,
            "inner" => Self::INNER,
            "infix" => Self::INFIX,
            "vararg" => Self::VARARG,
            "operator" => Self::OPERATOR,
            _ => return None,
        })
    }
}

/// An annotation use such as `@DisallowLambdaCapture("no raise")`
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Annotation class name
    pub name: Symbol,
    /// Arguments in source order
    pub args: Vec<AnnotationArg>,
    /// Source location
    pub span: FileSpan,
}

impl Annotation {
    /// Value of the argument named `key`, or of the first positional
    /// argument when no argument carries that name
    #[must_use]
    pub fn arg(&self, key: Symbol) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.name == Some(key))
            .or_else(|| self.args.iter().find(|arg| arg.name.is_none()))
            .map(|arg| arg.value.as_str())
    }
}

/// Annotation argument; only literal values are supported
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationArg {
    /// Parameter name for `key = value` arguments
    pub name: Option<Symbol>,
    /// Literal value; string literals are stored unquoted
    pub value: String,
}

/// Finds the annotation named `name`
#[must_use]
pub fn find_annotation(annotations: &[Annotation], name: Symbol) -> Option<&Annotation> {
    annotations.iter().find(|annotation| annotation.name == name)
}

/// Declaration-site variance of a type parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variance {
    /// No modifier
    #[default]
    Invariant,
    /// `out T`
    Out,
    /// `in T`
    In,
}

/// Generic type parameter
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    /// Parameter name
    pub name: Symbol,
    /// Declared variance
    pub variance: Variance,
    /// Upper bound after `:`
    pub bound: Option<TypeRef>,
}

/// Kind of a class-like declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// `class`
    Class,
    /// `object` (including companion objects)
    Object,
    /// `interface`
    Interface,
}

/// `val` or `var`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Read-only property
    Val,
    /// Mutable property
    Var,
}

/// Class, object or interface declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Class name; `Companion` for unnamed companion objects
    pub name: Symbol,
    /// Class, object or interface
    pub kind: ClassKind,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Generic parameters
    pub type_params: Vec<TypeParam>,
    /// Primary constructor parameters
    pub primary_ctor: Vec<CtorParam>,
    /// Supertypes after `:`
    pub supertypes: Vec<TypeRef>,
    /// Member declarations in source order
    pub members: Vec<Decl>,
    /// Source location
    pub span: FileSpan,
}

impl ClassDecl {
    /// Whether this is a companion object
    #[must_use]
    pub fn is_companion(&self) -> bool {
        self.modifiers.contains(Modifiers::COMPANION)
    }

    /// Companion object of this class
    #[must_use]
    pub fn companion(&self) -> Option<&Self> {
        self.members.iter().find_map(|decl| match decl {
            Decl::Class(class) if class.is_companion() => Some(class),
            _ => None,
        })
    }

    /// Member functions
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|decl| match decl {
            Decl::Function(function) => Some(function),
            _ => None,
        })
    }

    /// Body properties
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|decl| match decl {
            Decl::Property(property) => Some(property),
            _ => None,
        })
    }

    fn relocate(&mut self, anchor: FileSpan) {
        relocate_span(&mut self.span, anchor);
        for param in &mut self.primary_ctor {
            relocate_span(&mut param.span, anchor);
            param.ty.relocate(anchor);
            if let Some(default) = &mut param.default {
                default.relocate(anchor);
            }
        }
        for member in &mut self.members {
            member.relocate(anchor);
        }
    }
}

/// Primary constructor parameter
#[derive(Debug, Clone, PartialEq)]
pub struct CtorParam {
    /// Parameter name
    pub name: Symbol,
    /// Declared type
    pub ty: TypeRef,
    /// `val`/`var` when the parameter also declares a property
    pub binding: Option<Binding>,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Default value
    pub default: Option<Body>,
    /// Source location
    pub span: FileSpan,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Function name
    pub name: Symbol,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Generic parameters
    pub type_params: Vec<TypeParam>,
    /// `context(A, B)` receivers
    pub context_receivers: Vec<TypeRef>,
    /// Extension receiver type
    pub receiver: Option<TypeRef>,
    /// Value parameters
    pub params: Vec<Param>,
    /// Declared return type
    pub return_type: Option<TypeRef>,
    /// Body; absent for abstract and interface members
    pub body: Option<Body>,
    /// Source location
    pub span: FileSpan,
}

impl FunctionDecl {
    /// Whether the function is declared `inline`
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.modifiers.contains(Modifiers::INLINE)
    }

    /// Whether `other` declares the same overload: same name, extension
    /// receiver and parameter types, ignoring source locations
    #[must_use]
    pub fn same_signature(&self, other: &Self) -> bool {
        let receivers = match (&self.receiver, &other.receiver) {
            (Some(a), Some(b)) => a.same_type(b),
            (None, None) => true,
            _ => false,
        };
        self.name == other.name
            && receivers
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.vararg == b.vararg && a.ty.same_type(&b.ty))
    }

    /// Replaces every synthetic span in the function with `anchor`
    pub fn relocate(&mut self, anchor: FileSpan) {
        relocate_span(&mut self.span, anchor);
        for annotation in &mut self.annotations {
            relocate_span(&mut annotation.span, anchor);
        }
        for param in &mut self.params {
            relocate_span(&mut param.span, anchor);
            param.ty.relocate(anchor);
            if let Some(default) = &mut param.default {
                default.relocate(anchor);
            }
        }
        if let Some(ty) = &mut self.return_type {
            ty.relocate(anchor);
        }
        if let Some(body) = &mut self.body {
            body.relocate(anchor);
        }
    }
}

/// Function value parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: Symbol,
    /// Declared type
    pub ty: TypeRef,
    /// Annotations such as `@CallsInPlace`
    pub annotations: Vec<Annotation>,
    /// Declared `vararg`
    pub vararg: bool,
    /// Default value
    pub default: Option<Body>,
    /// Source location
    pub span: FileSpan,
}

/// Property declaration
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Property name
    pub name: Symbol,
    /// `val` or `var`
    pub binding: Binding,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Declared type
    pub ty: Option<TypeRef>,
    /// Initializer expression
    pub initializer: Option<Body>,
    /// Source location
    pub span: FileSpan,
}

impl PropertyDecl {
    fn relocate(&mut self, anchor: FileSpan) {
        relocate_span(&mut self.span, anchor);
        if let Some(ty) = &mut self.ty {
            ty.relocate(anchor);
        }
        if let Some(body) = &mut self.initializer {
            body.relocate(anchor);
        }
    }
}

/// `typealias Name<T> = Target`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    /// Alias name
    pub name: Symbol,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Generic parameters
    pub type_params: Vec<TypeParam>,
    /// Aliased type
    pub target: TypeRef,
    /// Source location
    pub span: FileSpan,
}
