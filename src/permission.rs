//! Request permission predicates.
//!
//! Each predicate answers one question about the caller and the kind of
//! operation being attempted. Endpoint policies are built by composing
//! predicates with [`PermissionExt::and`] and [`PermissionExt::or`].

use std::sync::Arc;

use axum::http::Method;

use crate::api::Identity;
use crate::config::MovieReadPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Operation::Read,
            Method::POST => Operation::Create,
            Method::DELETE => Operation::Delete,
            _ => Operation::Update,
        }
    }

    pub fn is_safe(self) -> bool {
        self == Operation::Read
    }
}

pub trait Permission: Send + Sync {
    fn is_allowed(&self, identity: &Identity, operation: Operation) -> bool;
}

pub struct AllowAny;

impl Permission for AllowAny {
    fn is_allowed(&self, _: &Identity, _: Operation) -> bool {
        true
    }
}

pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn is_allowed(&self, identity: &Identity, _: Operation) -> bool {
        identity.is_authenticated()
    }
}

pub struct IsStaff;

impl Permission for IsStaff {
    fn is_allowed(&self, identity: &Identity, _: Operation) -> bool {
        identity.is_staff()
    }
}

/// Allows safe (read) operations only.
pub struct ReadOnly;

impl Permission for ReadOnly {
    fn is_allowed(&self, _: &Identity, operation: Operation) -> bool {
        operation.is_safe()
    }
}

pub struct And<A, B>(pub A, pub B);

impl<A: Permission, B: Permission> Permission for And<A, B> {
    fn is_allowed(&self, identity: &Identity, operation: Operation) -> bool {
        self.0.is_allowed(identity, operation) && self.1.is_allowed(identity, operation)
    }
}

pub struct Or<A, B>(pub A, pub B);

impl<A: Permission, B: Permission> Permission for Or<A, B> {
    fn is_allowed(&self, identity: &Identity, operation: Operation) -> bool {
        self.0.is_allowed(identity, operation) || self.1.is_allowed(identity, operation)
    }
}

pub trait PermissionExt: Permission + Sized {
    fn and<P: Permission>(self, other: P) -> And<Self, P> {
        And(self, other)
    }

    fn or<P: Permission>(self, other: P) -> Or<Self, P> {
        Or(self, other)
    }
}

impl<T: Permission> PermissionExt for T {}

/// Permission set for every endpoint group.
#[derive(Clone)]
pub struct AccessPolicy {
    pub movie_create: Arc<dyn Permission>,
    pub movie_detail: Arc<dyn Permission>,
    pub movie_search: Arc<dyn Permission>,
    pub account: Arc<dyn Permission>,
    pub registration: Arc<dyn Permission>,
}

impl AccessPolicy {
    pub fn new(movie_read: MovieReadPolicy) -> Self {
        let movie_detail: Arc<dyn Permission> = match movie_read {
            MovieReadPolicy::Open => Arc::new(IsStaff.or(ReadOnly)),
            MovieReadPolicy::Authenticated => Arc::new(IsStaff.or(ReadOnly.and(IsAuthenticated))),
        };

        Self {
            movie_create: Arc::new(IsStaff),
            movie_detail,
            movie_search: Arc::new(IsAuthenticated),
            account: Arc::new(IsAuthenticated),
            registration: Arc::new(AllowAny),
        }
    }
}
