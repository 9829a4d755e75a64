//! Intermediate representation of the host language
//!
//! Declarations are plain trees; function and initializer bodies keep their
//! expressions in arenas (see [`Body`]). The [`SymbolTable`] is a snapshot
//! of a file's declarations and [`Session`] is the interface every pass
//! receives.

mod body;
mod decl;
mod diagnostic;
mod known;
mod session;
mod symbols;
mod types;
pub mod visitor;

pub use body::{
    Arg, AssignOp, BinaryOp, Body, BodyKind, CatchClause, Expr, ExprId, LambdaParam, Literal,
    Stmt, StmtId, UnaryOp, WhenBranch,
};
pub use decl::{
    Annotation, AnnotationArg, Binding, ClassDecl, ClassKind, CtorParam, Decl, DeclPath,
    FunctionDecl, Modifiers, Param, PropertyDecl, SourceFile, TypeAliasDecl, TypeParam, Variance,
    find_annotation,
};
pub use diagnostic::{Diagnostic, DiagnosticBag, DiagnosticKind, Severity};
pub use known::KnownNames;
pub use session::{CompilationSession, Session};
pub use symbols::{
    ClassSymbol, FunctionSignature, ParamSignature, PropertySymbol, SymbolTable, TypeAliasSymbol,
    substitute_params,
};
pub use types::{Ty, TyDisplay, TyVar, TypeRef, TypeRefDisplay};
