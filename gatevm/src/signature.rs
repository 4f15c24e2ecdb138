//! Signature strings: `NAME '(' arg_type* ')' return_type`, the link key
//! matching native callbacks to handler/function symbol tables.
//!
//! Grammar (see `spec.md` §3 and the glossary):
//!
//! ```text
//! signature  ::= name '(' type* ')' type
//! type       ::= 'V' | 'B' | 'I' | 'S' | 'P' | 'C' | 'R' | 'H' | array | assoc
//! array      ::= '[' type
//! assoc      ::= '>' type type
//! ```
//!
//! `array`/`assoc` are recursive: `[[S` is an array of arrays of string, `>S[I`
//! is an associative array from string to array-of-number. The reference
//! implementation this core was distilled from (`examples/original_source/lib/vm/Signature.cpp`)
//! parses the state machine below but its `typeSignature('[')`/`('>')` arms
//! never consume the element type(s) that follow — this implementation
//! completes the grammar.

use std::fmt;

/// A single argument or return type in a signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void,
    Boolean,
    Number,
    String,
    IpAddress,
    Cidr,
    RegExp,
    Handler,
    Array(Box<Type>),
    AssocArray(Box<Type>, Box<Type>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "V"),
            Type::Boolean => write!(f, "B"),
            Type::Number => write!(f, "I"),
            Type::String => write!(f, "S"),
            Type::IpAddress => write!(f, "P"),
            Type::Cidr => write!(f, "C"),
            Type::RegExp => write!(f, "R"),
            Type::Handler => write!(f, "H"),
            Type::Array(elem) => write!(f, "[{}", elem),
            Type::AssocArray(key, val) => write!(f, ">{}{}", key, val),
        }
    }
}

/// A parsed, `Display`-round-trippable signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    args: Vec<Type>,
    return_type: Type,
}

/// A signature string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("premature end of signature string {0:?}")]
    PrematureEnd(String),
    #[error("garbage after signature string {0:?}")]
    TrailingGarbage(String),
    #[error("unknown type character {0:?} in signature string {1:?}")]
    UnknownType(char, String),
}

#[derive(PartialEq, Eq)]
enum State {
    Name,
    ArgsBegin,
    Args,
    ReturnType,
    End,
}

impl Signature {
    /// Build a signature directly from its parts, bypassing the string
    /// parser. Used when constructing signatures programmatically (e.g. a
    /// [`crate::runtime::CallbackRegistry`] registration) rather than
    /// parsing one out of a bytecode unit's native-symbol tables.
    pub(crate) fn from_parts(name: String, args: Vec<Type>, return_type: Type) -> Self {
        Signature { name, args, return_type }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Parse `NAME '(' arg_type* ')' return_type`. Rejects premature end and
    /// trailing garbage rather than silently accepting them, per `spec.md`
    /// §9's note on the signature parser.
    pub fn parse(raw: &str) -> Result<Self, SignatureError> {
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0usize;
        let mut state = State::Name;
        let mut name = String::new();
        let mut args = Vec::new();
        let mut return_type = Type::Void;

        while i < chars.len() {
            match state {
                State::Name => {
                    if chars[i] == '(' {
                        state = State::ArgsBegin;
                    } else {
                        name.push(chars[i]);
                    }
                    i += 1;
                }
                State::ArgsBegin => {
                    state = State::Args;
                    // do not consume: re-examine this char as the first arg
                    // or the closing paren
                }
                State::Args => {
                    if chars[i] == ')' {
                        state = State::ReturnType;
                        i += 1;
                    } else {
                        let (ty, consumed) = parse_type(&chars, i, raw)?;
                        args.push(ty);
                        i += consumed;
                    }
                }
                State::ReturnType => {
                    let (ty, consumed) = parse_type(&chars, i, raw)?;
                    return_type = ty;
                    i += consumed;
                    state = State::End;
                }
                State::End => {
                    return Err(SignatureError::TrailingGarbage(raw.to_string()));
                }
            }
        }

        if state != State::End {
            return Err(SignatureError::PrematureEnd(raw.to_string()));
        }

        Ok(Signature { name, args, return_type })
    }
}

/// Parse a single (possibly composite) type starting at `chars[i]`. Returns
/// the type and the number of characters consumed.
fn parse_type(chars: &[char], i: usize, raw: &str) -> Result<(Type, usize), SignatureError> {
    if i >= chars.len() {
        return Err(SignatureError::PrematureEnd(raw.to_string()));
    }
    match chars[i] {
        'V' => Ok((Type::Void, 1)),
        'B' => Ok((Type::Boolean, 1)),
        'I' => Ok((Type::Number, 1)),
        'S' => Ok((Type::String, 1)),
        'P' => Ok((Type::IpAddress, 1)),
        'C' => Ok((Type::Cidr, 1)),
        'R' => Ok((Type::RegExp, 1)),
        'H' => Ok((Type::Handler, 1)),
        '[' => {
            let (elem, consumed) = parse_type(chars, i + 1, raw)?;
            Ok((Type::Array(Box::new(elem)), 1 + consumed))
        }
        '>' => {
            let (key, consumed_key) = parse_type(chars, i + 1, raw)?;
            let (val, consumed_val) = parse_type(chars, i + 1 + consumed_key, raw)?;
            Ok((Type::AssocArray(Box::new(key), Box::new(val)), 1 + consumed_key + consumed_val))
        }
        other => Err(SignatureError::UnknownType(other, raw.to_string())),
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for arg in &self.args {
            write!(f, "{}", arg)?;
        }
        write!(f, "){}", self.return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_signature() {
        let sig = Signature::parse("print(S)I").unwrap();
        assert_eq!(sig.name(), "print");
        assert_eq!(sig.args(), &[Type::String]);
        assert_eq!(sig.return_type(), &Type::Number);
    }

    #[test]
    fn parses_void_args_and_return() {
        let sig = Signature::parse("getcwd()S").unwrap();
        assert_eq!(sig.name(), "getcwd");
        assert!(sig.args().is_empty());
        assert_eq!(sig.return_type(), &Type::String);
    }

    #[test]
    fn round_trips_through_display() {
        for raw in ["print(S)I", "getcwd()S", "assert(BS)B"] {
            let sig = Signature::parse(raw).unwrap();
            assert_eq!(sig.to_string(), raw);
        }
    }

    #[test]
    fn array_consumes_its_element_type() {
        let sig = Signature::parse("sum([I)I").unwrap();
        assert_eq!(sig.args(), &[Type::Array(Box::new(Type::Number))]);
        assert_eq!(sig.to_string(), "sum([I)I");
    }

    #[test]
    fn assoc_array_consumes_key_and_value_types() {
        let sig = Signature::parse("lookup(>SI)B").unwrap();
        assert_eq!(sig.args(), &[Type::AssocArray(Box::new(Type::String), Box::new(Type::Number))]);
        assert_eq!(sig.to_string(), "lookup(>SI)B");
    }

    #[test]
    fn nested_composites_recurse() {
        let sig = Signature::parse("f([[S)V").unwrap();
        assert_eq!(sig.args(), &[Type::Array(Box::new(Type::Array(Box::new(Type::String))))]);
    }

    #[test]
    fn premature_end_is_rejected() {
        assert!(matches!(Signature::parse("print(S"), Err(SignatureError::PrematureEnd(_))));
        assert!(matches!(Signature::parse("print(S)"), Err(SignatureError::PrematureEnd(_))));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(Signature::parse("print(S)Ix"), Err(SignatureError::TrailingGarbage(_))));
    }

    #[test]
    fn unknown_type_character_is_rejected() {
        assert!(matches!(Signature::parse("print(Z)V"), Err(SignatureError::UnknownType('Z', _))));
    }
}
