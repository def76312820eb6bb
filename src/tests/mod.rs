//! End-to-end tests driving the router against mock intake and collector
//! servers.
