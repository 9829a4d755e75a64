//! Pre-interned names the passes compare against

use rk_intern::{Interner, Symbol};

macro_rules! known_names {
    ($($field:ident => $text:literal),* $(,)?) => {
        /// Symbols of built-in types, annotations and conventional names
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct KnownNames {
            $(
                #[doc = concat!("`", $text, "`")]
                pub $field: Symbol,
            )*
        }

        impl KnownNames {
            /// Interns every known name
            #[must_use]
            pub fn new(interner: &Interner) -> Self {
                Self {
                    $($field: interner.intern($text),)*
                }
            }
        }
    };
}

known_names! {
    int => "Int",
    long => "Long",
    double => "Double",
    boolean => "Boolean",
    char => "Char",
    string => "String",
    unit => "Unit",
    nothing => "Nothing",
    any => "Any",
    list => "List",
    mutable_list => "MutableList",
    mutable_iterable => "MutableIterable",
    pair => "Pair",
    int_range => "IntRange",
    iterable => "Iterable",
    throwable => "Throwable",
    exception => "Exception",
    illegal_state => "IllegalStateException",
    companion => "Companion",
    it => "it",
    meta => "Meta",
    disallow_lambda_capture => "DisallowLambdaCapture",
    calls_in_place => "CallsInPlace",
    msg => "msg",
    first => "first",
    second => "second",
    size => "size",
    length => "length",
    invoke => "invoke",
    to => "to",
}
