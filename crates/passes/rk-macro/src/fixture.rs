//! Sessions over small host programs for unit tests

use rk_intern::Interner;
use rk_ir::{ClassDecl, CompilationSession, Decl, DeclPath, FunctionDecl, Session, SourceFile};
use rk_span::FileId;

pub(crate) struct Fixture {
    pub(crate) session: CompilationSession,
    pub(crate) file: SourceFile,
    pub(crate) root: DeclPath,
}

impl Fixture {
    pub(crate) fn new(source: &str) -> Self {
        let interner = Interner::new();
        let file = rk_parser::parse_file(source, FileId(0), &interner).expect("parses");
        let symbols = rk_quote::build_symbols(&interner, &file).expect("prelude parses");
        Self {
            session: CompilationSession::new(interner, symbols),
            file,
            root: DeclPath::root(),
        }
    }

    pub(crate) fn class(&self, name: &str) -> &ClassDecl {
        let name = self.session.interner().intern(name);
        self.file
            .decls
            .iter()
            .find_map(|decl| match decl {
                Decl::Class(class) if class.name == name => Some(class),
                _ => None,
            })
            .expect("class exists")
    }

    pub(crate) fn function(&self, name: &str) -> &FunctionDecl {
        let name = self.session.interner().intern(name);
        self.file
            .decls
            .iter()
            .find_map(|decl| match decl {
                Decl::Function(function) if function.name == name => Some(function),
                _ => None,
            })
            .expect("function exists")
    }
}
