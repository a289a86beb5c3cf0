// This file holds HTTP handlers shared across the application that don't
// belong to any single crate (health checks, common middleware). The actual
// /healthz handler lives in the backend service since it needs the DB/KV
// clients wired into AppState.
