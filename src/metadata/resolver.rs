//! Token resolution capability injected into the decoder.
//!
//! CIL operands of the token kinds (`ldstr`, `call`, `ldfld`, `box`, `ldtoken`, ...) carry a
//! raw 4-byte [`crate::metadata::token::Token`]. What the token refers to lives in the
//! assembly metadata, which this crate does not load. Instead, the decoder asks a
//! [`MetadataResolver`] for each token and stores whatever it returns in the operand.
//!
//! # Key Components
//!
//! - [`MetadataResolver`] - The five resolution operations the decoder needs
//! - [`UserString`], [`MethodRef`], [`FieldRef`], [`TypeRef`], [`MemberRef`] - Resolved values
//! - [`TokenMap`] - An in-memory resolver populated by the caller
//! - [`OpaqueResolver`] - Resolves purely by token table, for tooling without metadata
//! - [`CachingResolver`] - Memoizes another resolver, safe to share between threads
//!
//! Every resolved value keeps its token, so decoded instructions can be encoded again without
//! consulting the resolver.
//!
//! # Examples
//!
//! ```rust
//! use cildecode::metadata::{resolver::{MetadataResolver, TokenMap}, token::Token};
//!
//! let mut map = TokenMap::new();
//! map.insert_string(Token(0x7000_0001), "Hello");
//! map.insert_method(Token(0x0A00_0002), Some("System.Console"), "WriteLine");
//!
//! assert_eq!(map.resolve_string(Token(0x7000_0001))?.value, "Hello");
//! assert_eq!(map.resolve_method(Token(0x0A00_0002))?.to_string(), "System.Console::WriteLine");
//! assert!(map.resolve_field(Token(0x0400_0001)).is_err());
//! # Ok::<(), cildecode::Error>(())
//! ```

use std::{collections::HashMap, fmt};

use dashmap::DashMap;

use crate::{
    metadata::{
        token::{
            Token, TABLE_FIELD, TABLE_MEMBER_REF, TABLE_METHOD_DEF, TABLE_METHOD_SPEC,
            TABLE_TYPE_DEF, TABLE_TYPE_REF, TABLE_TYPE_SPEC, TABLE_USER_STRING,
        },
        typename::TypeDescriptor,
    },
    Error, Result,
};

/// A string literal from the `#US` heap, as loaded by `ldstr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserString {
    /// The token this string was resolved from
    pub token: Token,
    /// The literal text
    pub value: String,
}

/// A method referenced by `call`, `callvirt`, `newobj`, `jmp`, `ldftn` or `ldvirtftn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// The token this method was resolved from
    pub token: Token,
    /// Display name of the declaring type, if known
    pub declaring_type: Option<String>,
    /// Method name
    pub name: String,
}

/// A field referenced by `ldfld`, `stfld`, `ldsfld` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// The token this field was resolved from
    pub token: Token,
    /// Display name of the declaring type, if known
    pub declaring_type: Option<String>,
    /// Field name
    pub name: String,
}

/// A type referenced by `box`, `newarr`, `castclass`, `initobj` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// The token this type was resolved from
    pub token: Token,
    /// Display name of the type
    pub name: String,
}

/// Any member `ldtoken` may load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    /// A method handle
    Method(MethodRef),
    /// A field handle
    Field(FieldRef),
    /// A type handle
    Type(TypeRef),
}

impl MemberRef {
    /// The token this member was resolved from
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            MemberRef::Method(method) => method.token,
            MemberRef::Field(field) => field.token,
            MemberRef::Type(ty) => ty.token,
        }
    }
}

impl fmt::Display for UserString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.value.escape_default())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaring_type {
            Some(declaring) => write!(f, "{declaring}::{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaring_type {
            Some(declaring) => write!(f, "{declaring}::{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Method(method) => write!(f, "method {method}"),
            MemberRef::Field(field) => write!(f, "field {field}"),
            MemberRef::Type(ty) => write!(f, "{ty}"),
        }
    }
}

/// Resolves inline metadata tokens to the entities they reference.
///
/// The decoder calls exactly one of these functions for every token-carrying operand. Each
/// call is synchronous; implementations that cache are responsible for their own
/// synchronization. A failure must be reported as [`crate::Error::UnresolvedToken`] and aborts
/// the decode of the current method body.
pub trait MetadataResolver {
    /// Resolves an `ldstr` token.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if the token does not name a user string.
    fn resolve_string(&self, token: Token) -> Result<UserString>;

    /// Resolves a method token.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if the token does not name a method.
    fn resolve_method(&self, token: Token) -> Result<MethodRef>;

    /// Resolves a field token.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if the token does not name a field.
    fn resolve_field(&self, token: Token) -> Result<FieldRef>;

    /// Resolves a type token.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if the token does not name a type.
    fn resolve_type(&self, token: Token) -> Result<TypeRef>;

    /// Resolves an `ldtoken` operand, which may name a method, field or type.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if the token does not name any member.
    fn resolve_member(&self, token: Token) -> Result<MemberRef>;
}

impl<R: MetadataResolver + ?Sized> MetadataResolver for &R {
    fn resolve_string(&self, token: Token) -> Result<UserString> {
        (**self).resolve_string(token)
    }

    fn resolve_method(&self, token: Token) -> Result<MethodRef> {
        (**self).resolve_method(token)
    }

    fn resolve_field(&self, token: Token) -> Result<FieldRef> {
        (**self).resolve_field(token)
    }

    fn resolve_type(&self, token: Token) -> Result<TypeRef> {
        (**self).resolve_type(token)
    }

    fn resolve_member(&self, token: Token) -> Result<MemberRef> {
        (**self).resolve_member(token)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    String(String),
    Method {
        declaring_type: Option<String>,
        name: String,
    },
    Field {
        declaring_type: Option<String>,
        name: String,
    },
    Type(String),
}

/// An in-memory resolver populated explicitly by the caller.
///
/// Each token maps to exactly one entry. Asking for a token under the wrong category (e.g.
/// resolving a field token as a method) fails just like asking for an absent token.
#[derive(Debug, Default, Clone)]
pub struct TokenMap {
    entries: HashMap<Token, Entry>,
}

impl TokenMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no token has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a user string.
    pub fn insert_string(&mut self, token: Token, value: impl Into<String>) -> &mut Self {
        self.entries.insert(token, Entry::String(value.into()));
        self
    }

    /// Registers a method with an optional declaring type name.
    pub fn insert_method(
        &mut self,
        token: Token,
        declaring_type: Option<&str>,
        name: impl Into<String>,
    ) -> &mut Self {
        self.entries.insert(
            token,
            Entry::Method {
                declaring_type: declaring_type.map(str::to_string),
                name: name.into(),
            },
        );
        self
    }

    /// Registers a field with an optional declaring type name.
    pub fn insert_field(
        &mut self,
        token: Token,
        declaring_type: Option<&str>,
        name: impl Into<String>,
    ) -> &mut Self {
        self.entries.insert(
            token,
            Entry::Field {
                declaring_type: declaring_type.map(str::to_string),
                name: name.into(),
            },
        );
        self
    }

    /// Registers a type under an already formatted display name.
    pub fn insert_type(&mut self, token: Token, name: impl Into<String>) -> &mut Self {
        self.entries.insert(token, Entry::Type(name.into()));
        self
    }

    /// Registers a type, rendering its display name from a descriptor.
    pub fn insert_type_descriptor(&mut self, token: Token, ty: &TypeDescriptor) -> &mut Self {
        self.insert_type(token, ty.to_string())
    }

    fn method(token: Token, entry: Option<&Entry>) -> Option<MethodRef> {
        match entry {
            Some(Entry::Method {
                declaring_type,
                name,
            }) => Some(MethodRef {
                token,
                declaring_type: declaring_type.clone(),
                name: name.clone(),
            }),
            _ => None,
        }
    }

    fn field(token: Token, entry: Option<&Entry>) -> Option<FieldRef> {
        match entry {
            Some(Entry::Field {
                declaring_type,
                name,
            }) => Some(FieldRef {
                token,
                declaring_type: declaring_type.clone(),
                name: name.clone(),
            }),
            _ => None,
        }
    }

    fn ty(token: Token, entry: Option<&Entry>) -> Option<TypeRef> {
        match entry {
            Some(Entry::Type(name)) => Some(TypeRef {
                token,
                name: name.clone(),
            }),
            _ => None,
        }
    }
}

impl MetadataResolver for TokenMap {
    fn resolve_string(&self, token: Token) -> Result<UserString> {
        match self.entries.get(&token) {
            Some(Entry::String(value)) => Ok(UserString {
                token,
                value: value.clone(),
            }),
            _ => Err(Error::UnresolvedToken(token)),
        }
    }

    fn resolve_method(&self, token: Token) -> Result<MethodRef> {
        Self::method(token, self.entries.get(&token)).ok_or(Error::UnresolvedToken(token))
    }

    fn resolve_field(&self, token: Token) -> Result<FieldRef> {
        Self::field(token, self.entries.get(&token)).ok_or(Error::UnresolvedToken(token))
    }

    fn resolve_type(&self, token: Token) -> Result<TypeRef> {
        Self::ty(token, self.entries.get(&token)).ok_or(Error::UnresolvedToken(token))
    }

    fn resolve_member(&self, token: Token) -> Result<MemberRef> {
        let entry = self.entries.get(&token);
        Self::method(token, entry)
            .map(MemberRef::Method)
            .or_else(|| Self::field(token, entry).map(MemberRef::Field))
            .or_else(|| Self::ty(token, entry).map(MemberRef::Type))
            .ok_or(Error::UnresolvedToken(token))
    }
}

/// Resolves tokens by their table alone, naming every entity after its token.
///
/// Useful when only raw IL is available: the decode still validates that each token points
/// into a table that makes sense for its opcode (a `call` into the `Field` table fails), and
/// the output shows the raw token values. Null tokens never resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueResolver;

impl OpaqueResolver {
    fn check(token: Token, tables: &[u8]) -> Result<String> {
        if token.is_null() || !tables.contains(&token.table()) {
            return Err(Error::UnresolvedToken(token));
        }
        Ok(token.to_string())
    }
}

impl MetadataResolver for OpaqueResolver {
    fn resolve_string(&self, token: Token) -> Result<UserString> {
        let value = Self::check(token, &[TABLE_USER_STRING])?;
        Ok(UserString { token, value })
    }

    fn resolve_method(&self, token: Token) -> Result<MethodRef> {
        let name = Self::check(
            token,
            &[TABLE_METHOD_DEF, TABLE_MEMBER_REF, TABLE_METHOD_SPEC],
        )?;
        Ok(MethodRef {
            token,
            declaring_type: None,
            name,
        })
    }

    fn resolve_field(&self, token: Token) -> Result<FieldRef> {
        let name = Self::check(token, &[TABLE_FIELD, TABLE_MEMBER_REF])?;
        Ok(FieldRef {
            token,
            declaring_type: None,
            name,
        })
    }

    fn resolve_type(&self, token: Token) -> Result<TypeRef> {
        let name = Self::check(token, &[TABLE_TYPE_REF, TABLE_TYPE_DEF, TABLE_TYPE_SPEC])?;
        Ok(TypeRef { token, name })
    }

    fn resolve_member(&self, token: Token) -> Result<MemberRef> {
        match token.table() {
            TABLE_FIELD => self.resolve_field(token).map(MemberRef::Field),
            TABLE_TYPE_REF | TABLE_TYPE_DEF | TABLE_TYPE_SPEC => {
                self.resolve_type(token).map(MemberRef::Type)
            }
            _ => self.resolve_method(token).map(MemberRef::Method),
        }
    }
}

/// Memoizes the successful resolutions of another resolver.
///
/// The caches are [`DashMap`]s, so a single `CachingResolver` can be shared by every worker of
/// a parallel batch decode. Failures are not cached and are retried on the next request.
///
/// # Examples
///
/// ```rust
/// use cildecode::metadata::{
///     resolver::{CachingResolver, MetadataResolver, OpaqueResolver},
///     token::Token,
/// };
///
/// let resolver = CachingResolver::new(OpaqueResolver);
/// resolver.resolve_type(Token(0x0100_0004))?;
/// resolver.resolve_type(Token(0x0100_0004))?;
/// assert_eq!(resolver.cached(), 1);
/// # Ok::<(), cildecode::Error>(())
/// ```
pub struct CachingResolver<R> {
    inner: R,
    strings: DashMap<Token, UserString>,
    methods: DashMap<Token, MethodRef>,
    fields: DashMap<Token, FieldRef>,
    types: DashMap<Token, TypeRef>,
    members: DashMap<Token, MemberRef>,
}

impl<R: MetadataResolver> CachingResolver<R> {
    /// Wraps `inner` with empty caches.
    pub fn new(inner: R) -> Self {
        CachingResolver {
            inner,
            strings: DashMap::new(),
            methods: DashMap::new(),
            fields: DashMap::new(),
            types: DashMap::new(),
            members: DashMap::new(),
        }
    }

    /// The wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Total number of cached resolutions across all categories.
    pub fn cached(&self) -> usize {
        self.strings.len()
            + self.methods.len()
            + self.fields.len()
            + self.types.len()
            + self.members.len()
    }

    fn lookup<T: Clone>(
        cache: &DashMap<Token, T>,
        token: Token,
        resolve: impl FnOnce(Token) -> Result<T>,
    ) -> Result<T> {
        if let Some(hit) = cache.get(&token) {
            return Ok(hit.value().clone());
        }

        let value = resolve(token)?;
        cache.insert(token, value.clone());
        Ok(value)
    }
}

impl<R: MetadataResolver> MetadataResolver for CachingResolver<R> {
    fn resolve_string(&self, token: Token) -> Result<UserString> {
        Self::lookup(&self.strings, token, |t| self.inner.resolve_string(t))
    }

    fn resolve_method(&self, token: Token) -> Result<MethodRef> {
        Self::lookup(&self.methods, token, |t| self.inner.resolve_method(t))
    }

    fn resolve_field(&self, token: Token) -> Result<FieldRef> {
        Self::lookup(&self.fields, token, |t| self.inner.resolve_field(t))
    }

    fn resolve_type(&self, token: Token) -> Result<TypeRef> {
        Self::lookup(&self.types, token, |t| self.inner.resolve_type(t))
    }

    fn resolve_member(&self, token: Token) -> Result<MemberRef> {
        Self::lookup(&self.members, token, |t| self.inner.resolve_member(t))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::metadata::typename::PrimitiveType;

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl MetadataResolver for CountingResolver {
        fn resolve_string(&self, token: Token) -> Result<UserString> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OpaqueResolver.resolve_string(token)
        }

        fn resolve_method(&self, token: Token) -> Result<MethodRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OpaqueResolver.resolve_method(token)
        }

        fn resolve_field(&self, token: Token) -> Result<FieldRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OpaqueResolver.resolve_field(token)
        }

        fn resolve_type(&self, token: Token) -> Result<TypeRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OpaqueResolver.resolve_type(token)
        }

        fn resolve_member(&self, token: Token) -> Result<MemberRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OpaqueResolver.resolve_member(token)
        }
    }

    #[test]
    fn token_map_categories() {
        let mut map = TokenMap::new();
        map.insert_string(Token(0x7000_0001), "text")
            .insert_method(Token(0x0600_0001), Some("Program"), "Main")
            .insert_field(Token(0x0400_0003), None, "count")
            .insert_type_descriptor(Token(0x0100_0002), &TypeDescriptor::Primitive(PrimitiveType::Int32));

        assert_eq!(map.len(), 4);
        assert_eq!(map.resolve_string(Token(0x7000_0001)).unwrap().value, "text");
        assert_eq!(map.resolve_method(Token(0x0600_0001)).unwrap().name, "Main");
        assert_eq!(map.resolve_field(Token(0x0400_0003)).unwrap().name, "count");
        assert_eq!(map.resolve_type(Token(0x0100_0002)).unwrap().name, "int");

        assert!(matches!(
            map.resolve_method(Token(0x0400_0003)),
            Err(Error::UnresolvedToken(Token(0x0400_0003)))
        ));
        assert!(map.resolve_string(Token(0x7000_0099)).is_err());
    }

    #[test]
    fn token_map_members() {
        let mut map = TokenMap::new();
        map.insert_field(Token(0x0400_0001), Some("C"), "f")
            .insert_type(Token(0x0200_0002), "C")
            .insert_string(Token(0x7000_0001), "s");

        assert!(matches!(
            map.resolve_member(Token(0x0400_0001)),
            Ok(MemberRef::Field(_))
        ));
        assert!(matches!(
            map.resolve_member(Token(0x0200_0002)),
            Ok(MemberRef::Type(_))
        ));
        assert!(map.resolve_member(Token(0x7000_0001)).is_err());
    }

    #[test]
    fn opaque_checks_tables() {
        assert!(OpaqueResolver.resolve_string(Token(0x7000_0001)).is_ok());
        assert!(OpaqueResolver.resolve_string(Token(0x0600_0001)).is_err());
        assert!(OpaqueResolver.resolve_method(Token(0x0A00_0010)).is_ok());
        assert!(OpaqueResolver.resolve_method(Token(0x0400_0001)).is_err());
        assert!(OpaqueResolver.resolve_field(Token(0x0A00_0010)).is_ok());
        assert!(OpaqueResolver.resolve_type(Token(0x1B00_0001)).is_ok());
        assert!(OpaqueResolver.resolve_type(Token(0x0200_0000)).is_err());

        assert!(matches!(
            OpaqueResolver.resolve_member(Token(0x0400_0001)),
            Ok(MemberRef::Field(_))
        ));
        assert!(matches!(
            OpaqueResolver.resolve_member(Token(0x0200_0001)),
            Ok(MemberRef::Type(_))
        ));
        assert!(matches!(
            OpaqueResolver.resolve_member(Token(0x0600_0001)),
            Ok(MemberRef::Method(_))
        ));
    }

    #[test]
    fn caching_hits_inner_once() {
        let resolver = CachingResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });

        for _ in 0..3 {
            resolver.resolve_method(Token(0x0600_0001)).unwrap();
        }
        resolver.resolve_type(Token(0x0200_0001)).unwrap();

        assert_eq!(resolver.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn caching_does_not_store_failures() {
        let resolver = CachingResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });

        assert!(resolver.resolve_field(Token(0x0600_0001)).is_err());
        assert!(resolver.resolve_field(Token(0x0600_0001)).is_err());

        assert_eq!(resolver.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn display_forms() {
        let method = MethodRef {
            token: Token(0x0A00_0001),
            declaring_type: Some("System.Console".into()),
            name: "WriteLine".into(),
        };
        assert_eq!(method.to_string(), "System.Console::WriteLine");

        let string = UserString {
            token: Token(0x7000_0001),
            value: "a\"b\n".into(),
        };
        assert_eq!(string.to_string(), "\"a\\\"b\\n\"");
    }
}
