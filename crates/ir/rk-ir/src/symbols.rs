//! Symbol table of a compilation unit
//!
//! The table is a snapshot of the declarations of a file. It keeps types in
//! their syntactic form and lowers them on demand with
//! [`SymbolTable::lower_type`], so generic signatures can be instantiated
//! per use.

use crate::{
    Annotation, Binding, ClassDecl, ClassKind, Decl, FunctionDecl, KnownNames, Modifiers,
    PropertyDecl, SourceFile, Ty, TypeAliasDecl, TypeRef, Variance, find_annotation,
};
use indexmap::IndexMap;
use rk_intern::{Interner, Symbol};
use rk_span::FileSpan;
use rustc_hash::FxHashMap;

/// Value parameter of a signature
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSignature {
    /// Parameter name
    pub name: Symbol,
    /// Declared type
    pub ty: TypeRef,
    /// Parameter annotations
    pub annotations: Vec<Annotation>,
    /// Declared `vararg`
    pub vararg: bool,
    /// Whether the parameter may be omitted at call sites
    pub has_default: bool,
}

/// Signature of a function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    /// Function name
    pub name: Symbol,
    /// Class declaring the function
    pub owner: Option<Symbol>,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Annotations on the function
    pub annotations: Vec<Annotation>,
    /// Generic parameters
    pub type_params: Vec<Symbol>,
    /// `context(...)` receivers
    pub context_receivers: Vec<TypeRef>,
    /// Extension receiver
    pub receiver: Option<TypeRef>,
    /// Value parameters
    pub params: Vec<ParamSignature>,
    /// Declared return type
    pub return_type: Option<TypeRef>,
    /// Whether the body was written as `= expr`
    pub expression_body: bool,
    /// Source location
    pub span: FileSpan,
}

impl FunctionSignature {
    /// Signature of a declared function
    #[must_use]
    pub fn of(function: &FunctionDecl, owner: Option<Symbol>) -> Self {
        Self {
            name: function.name,
            owner,
            modifiers: function.modifiers,
            annotations: function.annotations.clone(),
            type_params: function.type_params.iter().map(|p| p.name).collect(),
            context_receivers: function.context_receivers.clone(),
            receiver: function.receiver.clone(),
            params: function
                .params
                .iter()
                .map(|param| ParamSignature {
                    name: param.name,
                    ty: param.ty.clone(),
                    annotations: param.annotations.clone(),
                    vararg: param.vararg,
                    has_default: param.default.is_some(),
                })
                .collect(),
            return_type: function.return_type.clone(),
            expression_body: function
                .body
                .as_ref()
                .is_some_and(|body| body.kind == crate::BodyKind::Expression),
            span: function.span,
        }
    }

    /// Whether the function is declared `inline`
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.modifiers.contains(Modifiers::INLINE)
    }

    /// The annotation named `name`
    #[must_use]
    pub fn annotation(&self, name: Symbol) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }
}

/// A property known to the table
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySymbol {
    /// Property name
    pub name: Symbol,
    /// `val` or `var`
    pub binding: Binding,
    /// Declared type
    pub ty: Option<TypeRef>,
    /// Source location
    pub span: FileSpan,
}

/// A type alias known to the table
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasSymbol {
    /// Alias name
    pub name: Symbol,
    /// Generic parameters
    pub type_params: Vec<Symbol>,
    /// Aliased type
    pub target: TypeRef,
}

/// A class, object or interface known to the table
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSymbol {
    /// Class name
    pub name: Symbol,
    /// Class, object or interface
    pub kind: ClassKind,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Annotations
    pub annotations: Vec<Annotation>,
    /// Generic parameters
    pub type_params: Vec<Symbol>,
    /// Variance of each generic parameter
    pub variances: Vec<Variance>,
    /// Primary constructor parameters
    pub ctor_params: Vec<ParamSignature>,
    /// Properties from `val`/`var` constructor parameters and the body,
    /// in declaration order
    pub properties: IndexMap<Symbol, PropertySymbol>,
    /// Member functions
    pub functions: Vec<FunctionSignature>,
    /// Companion object
    pub companion: Option<Box<ClassSymbol>>,
    /// Supertypes
    pub supertypes: Vec<TypeRef>,
    /// Source location
    pub span: FileSpan,
}

impl ClassSymbol {
    /// Collects the symbol of a declared class
    #[must_use]
    pub fn of(class: &ClassDecl) -> Self {
        let mut properties = IndexMap::new();
        for param in &class.primary_ctor {
            if let Some(binding) = param.binding {
                properties.insert(
                    param.name,
                    PropertySymbol {
                        name: param.name,
                        binding,
                        ty: Some(param.ty.clone()),
                        span: param.span,
                    },
                );
            }
        }
        let mut functions = Vec::new();
        let mut companion = None;
        for member in &class.members {
            match member {
                Decl::Property(property) => {
                    properties.insert(property.name, PropertySymbol::of(property));
                }
                Decl::Function(function) => {
                    functions.push(FunctionSignature::of(function, Some(class.name)));
                }
                Decl::Class(nested) if nested.is_companion() => {
                    companion = Some(Box::new(Self::of(nested)));
                }
                Decl::Class(_) | Decl::TypeAlias(_) => {}
            }
        }
        Self {
            name: class.name,
            kind: class.kind,
            modifiers: class.modifiers,
            annotations: class.annotations.clone(),
            type_params: class.type_params.iter().map(|p| p.name).collect(),
            variances: class.type_params.iter().map(|p| p.variance).collect(),
            ctor_params: class
                .primary_ctor
                .iter()
                .map(|param| ParamSignature {
                    name: param.name,
                    ty: param.ty.clone(),
                    annotations: param.annotations.clone(),
                    vararg: false,
                    has_default: param.default.is_some(),
                })
                .collect(),
            properties,
            functions,
            companion,
            supertypes: class.supertypes.clone(),
            span: class.span,
        }
    }

    /// Member functions named `name`
    pub fn functions_named(&self, name: Symbol) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.iter().filter(move |f| f.name == name)
    }

    /// The annotation named `name`
    #[must_use]
    pub fn annotation(&self, name: Symbol) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }
}

impl PropertySymbol {
    fn of(property: &PropertyDecl) -> Self {
        Self {
            name: property.name,
            binding: property.binding,
            ty: property.ty.clone(),
            span: property.span,
        }
    }
}

/// Declarations visible to a compilation unit
#[derive(Debug, Clone)]
pub struct SymbolTable {
    known: KnownNames,
    classes: FxHashMap<Symbol, ClassSymbol>,
    functions: FxHashMap<Symbol, Vec<FunctionSignature>>,
    properties: FxHashMap<Symbol, PropertySymbol>,
    aliases: FxHashMap<Symbol, TypeAliasSymbol>,
}

impl SymbolTable {
    /// Creates an empty table
    #[must_use]
    pub fn new(interner: &Interner) -> Self {
        Self {
            known: KnownNames::new(interner),
            classes: FxHashMap::default(),
            functions: FxHashMap::default(),
            properties: FxHashMap::default(),
            aliases: FxHashMap::default(),
        }
    }

    /// Builds the table of a parsed file
    #[must_use]
    pub fn from_file(interner: &Interner, file: &SourceFile) -> Self {
        let mut table = Self::new(interner);
        for decl in &file.decls {
            table.insert(decl);
        }
        table
    }

    /// Names the passes compare against
    #[must_use]
    pub fn known(&self) -> &KnownNames {
        &self.known
    }

    /// Adds a top-level declaration; nested classes are added by simple name
    pub fn insert(&mut self, decl: &Decl) {
        match decl {
            Decl::Class(class) => {
                for member in &class.members {
                    if matches!(member, Decl::Class(nested) if !nested.is_companion()) {
                        self.insert(member);
                    }
                }
                self.classes.insert(class.name, ClassSymbol::of(class));
            }
            Decl::Function(function) => {
                self.functions
                    .entry(function.name)
                    .or_default()
                    .push(FunctionSignature::of(function, None));
            }
            Decl::Property(property) => {
                self.properties
                    .insert(property.name, PropertySymbol::of(property));
            }
            Decl::TypeAlias(alias) => {
                self.aliases.insert(alias.name, TypeAliasSymbol::of(alias));
            }
        }
    }

    /// Class named `name`
    #[must_use]
    pub fn class(&self, name: Symbol) -> Option<&ClassSymbol> {
        self.classes.get(&name)
    }

    /// Every class in the table
    pub fn classes(&self) -> impl Iterator<Item = &ClassSymbol> {
        self.classes.values()
    }

    /// Top-level functions named `name`, including extensions
    #[must_use]
    pub fn functions(&self, name: Symbol) -> &[FunctionSignature] {
        self.functions.get(&name).map_or(&[], Vec::as_slice)
    }

    /// Top-level property named `name`
    #[must_use]
    pub fn property(&self, name: Symbol) -> Option<&PropertySymbol> {
        self.properties.get(&name)
    }

    /// Type alias named `name`
    #[must_use]
    pub fn alias(&self, name: Symbol) -> Option<&TypeAliasSymbol> {
        self.aliases.get(&name)
    }

    /// Whether `name` is declared as `@Meta annotation class`
    #[must_use]
    pub fn is_meta_annotation(&self, name: Symbol) -> bool {
        self.class(name).is_some_and(|class| {
            class.modifiers.contains(Modifiers::ANNOTATION)
                && class.annotation(self.known.meta).is_some()
        })
    }

    /// Lowers a written type. `generics` are the type parameters in scope;
    /// unknown names lower to [`Ty::Error`].
    #[must_use]
    pub fn lower_type(&self, ty: &TypeRef, generics: &[Symbol]) -> Ty {
        match ty {
            TypeRef::Star { .. } => Ty::Star,
            TypeRef::Function {
                receiver,
                params,
                ret,
                nullable,
                ..
            } => {
                let lowered = Ty::Function {
                    receiver: receiver
                        .as_ref()
                        .map(|r| Box::new(self.lower_type(r, generics))),
                    params: params.iter().map(|p| self.lower_type(p, generics)).collect(),
                    ret: Box::new(self.lower_type(ret, generics)),
                };
                if *nullable { lowered.nullable() } else { lowered }
            }
            TypeRef::Named {
                name,
                args,
                nullable,
                ..
            } => {
                let args: Vec<Ty> = args.iter().map(|a| self.lower_type(a, generics)).collect();
                let lowered = self.lower_named(*name, args, generics);
                if *nullable { lowered.nullable() } else { lowered }
            }
        }
    }

    fn lower_named(&self, name: Symbol, args: Vec<Ty>, generics: &[Symbol]) -> Ty {
        let k = &self.known;
        let primitive = [
            (k.int, Ty::Int),
            (k.long, Ty::Long),
            (k.double, Ty::Double),
            (k.boolean, Ty::Boolean),
            (k.char, Ty::Char),
            (k.string, Ty::String),
            (k.unit, Ty::Unit),
            (k.nothing, Ty::Nothing),
            (k.any, Ty::Any),
        ];
        if let Some((_, ty)) = primitive.into_iter().find(|(sym, _)| *sym == name) {
            return ty;
        }
        if generics.contains(&name) {
            return Ty::Param(name);
        }
        if let Some(alias) = self.alias(name) {
            let target = self.lower_type(&alias.target, &alias.type_params);
            let substitution: FxHashMap<Symbol, Ty> =
                alias.type_params.iter().copied().zip(args).collect();
            return substitute_params(&target, &substitution);
        }
        match self.class(name) {
            Some(class) if class.type_params.len() == args.len() => Ty::Class { name, args },
            _ => Ty::Error,
        }
    }
}

impl TypeAliasSymbol {
    fn of(alias: &TypeAliasDecl) -> Self {
        Self {
            name: alias.name,
            type_params: alias.type_params.iter().map(|p| p.name).collect(),
            target: alias.target.clone(),
        }
    }
}

/// Replaces generic parameters by the types mapped to them
#[must_use]
pub fn substitute_params(ty: &Ty, substitution: &FxHashMap<Symbol, Ty>) -> Ty {
    match ty {
        Ty::Param(name) => substitution.get(name).cloned().unwrap_or(Ty::Param(*name)),
        Ty::Nullable(inner) => substitute_params(inner, substitution).nullable(),
        Ty::Class { name, args } => Ty::Class {
            name: *name,
            args: args
                .iter()
                .map(|arg| substitute_params(arg, substitution))
                .collect(),
        },
        Ty::Function {
            receiver,
            params,
            ret,
        } => Ty::Function {
            receiver: receiver
                .as_ref()
                .map(|r| Box::new(substitute_params(r, substitution))),
            params: params
                .iter()
                .map(|p| substitute_params(p, substitution))
                .collect(),
            ret: Box::new(substitute_params(ret, substitution)),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassDecl, CtorParam};
    use pretty_assertions::assert_eq;
    use rk_span::{FileId, Span};

    fn span() -> FileSpan {
        FileSpan::new(FileId(0), Span::new(0, 1))
    }

    fn sample(interner: &Interner) -> ClassDecl {
        let param = |name: &str, ty: &str, binding| CtorParam {
            name: interner.intern(name),
            ty: TypeRef::named(interner.intern(ty), span()),
            binding,
            annotations: Vec::new(),
            default: None,
            span: span(),
        };
        ClassDecl {
            name: interner.intern("Sample"),
            kind: ClassKind::Class,
            modifiers: Modifiers::DATA,
            annotations: Vec::new(),
            type_params: Vec::new(),
            primary_ctor: vec![
                param("foo", "Int", Some(Binding::Val)),
                param("hidden", "Int", None),
                param("bar", "String", Some(Binding::Var)),
            ],
            supertypes: Vec::new(),
            members: Vec::new(),
            span: span(),
        }
    }

    fn generic_class(interner: &Interner, name: &str, params: &[&str]) -> Decl {
        Decl::Class(ClassDecl {
            name: interner.intern(name),
            kind: ClassKind::Interface,
            modifiers: Modifiers::empty(),
            annotations: Vec::new(),
            type_params: params
                .iter()
                .map(|p| crate::TypeParam {
                    name: interner.intern(p),
                    variance: Variance::Out,
                    bound: None,
                })
                .collect(),
            primary_ctor: Vec::new(),
            supertypes: Vec::new(),
            members: Vec::new(),
            span: span(),
        })
    }

    #[test]
    fn constructor_properties_keep_declaration_order() {
        let interner = Interner::new();
        let symbol = ClassSymbol::of(&sample(&interner));
        let names: Vec<&str> = symbol
            .properties
            .keys()
            .map(|name| interner.resolve(name))
            .collect();
        assert_eq!(names, vec!["foo", "bar"]);
        assert_eq!(symbol.ctor_params.len(), 3);
    }

    #[test]
    fn lowers_declared_and_generic_types() {
        let interner = Interner::new();
        let mut table = SymbolTable::new(&interner);
        table.insert(&Decl::Class(sample(&interner)));
        table.insert(&generic_class(&interner, "List", &["E"]));
        let list_of_sample = TypeRef::Named {
            name: interner.intern("List"),
            args: vec![TypeRef::named(interner.intern("Sample"), span())],
            nullable: true,
            span: span(),
        };
        let lowered = table.lower_type(&list_of_sample, &[]);
        assert_eq!(
            lowered.display(&interner).to_string(),
            "List<Sample>?"
        );
        let unknown = TypeRef::named(interner.intern("Missing"), span());
        assert_eq!(table.lower_type(&unknown, &[]), Ty::Error);
        let wrong_arity = TypeRef::named(interner.intern("List"), span());
        assert_eq!(table.lower_type(&wrong_arity, &[]), Ty::Error);
    }

    #[test]
    fn aliases_substitute_arguments() {
        let interner = Interner::new();
        let mut table = SymbolTable::new(&interner);
        table.insert(&generic_class(&interner, "Pair", &["A", "B"]));
        let t = interner.intern("T");
        table.insert(&Decl::TypeAlias(TypeAliasDecl {
            name: interner.intern("Named"),
            annotations: Vec::new(),
            type_params: vec![crate::TypeParam {
                name: t,
                variance: Variance::Invariant,
                bound: None,
            }],
            target: TypeRef::Named {
                name: interner.intern("Pair"),
                args: vec![
                    TypeRef::named(interner.intern("String"), span()),
                    TypeRef::named(t, span()),
                ],
                nullable: false,
                span: span(),
            },
            span: span(),
        }));
        let use_site = TypeRef::Named {
            name: interner.intern("Named"),
            args: vec![TypeRef::named(interner.intern("Int"), span())],
            nullable: false,
            span: span(),
        };
        assert_eq!(
            table.lower_type(&use_site, &[]).display(&interner).to_string(),
            "Pair<String, Int>"
        );
    }
}
