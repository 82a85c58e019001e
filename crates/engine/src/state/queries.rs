//! Catalog SQL
//!
//! Every output column is cast to `text`. Parameters are bound as text.
//! ACLs are exploded with `aclexplode`; a `NULL` ACL is replaced by the
//! object's implicit default via `acldefault`, and grantee oid 0 is
//! reported as `PUBLIC`. The owner's own entries are left out: an owner's
//! privileges are implicit and never reconciled.

/// All roles minus PostgreSQL internals
pub const LIST_ROLES: &str = "\
SELECT r.rolname::text
FROM pg_roles r
WHERE r.rolname !~ '^pg_' AND r.rolname <> 'postgres'
ORDER BY r.rolname";

/// Name of the connected database
pub const CURRENT_DATABASE: &str = "SELECT current_database()::text";

/// Role the session runs as
pub const CURRENT_USER: &str = "SELECT current_user::text";

/// `$1` role -> (privilege) on the connected database
pub const DATABASE_PRIVILEGES: &str = "\
SELECT a.privilege_type::text
FROM pg_database d
CROSS JOIN LATERAL aclexplode(COALESCE(d.datacl, acldefault('d', d.datdba))) a
JOIN pg_roles r ON r.oid = a.grantee
WHERE d.datname = current_database()
  AND r.rolname = $1
  AND a.grantee <> d.datdba
ORDER BY 1";

/// `$1` role -> (schema, privilege) for every user schema
pub const SCHEMA_PRIVILEGES: &str = "\
SELECT n.nspname::text, a.privilege_type::text
FROM pg_namespace n
CROSS JOIN LATERAL aclexplode(COALESCE(n.nspacl, acldefault('n', n.nspowner))) a
JOIN pg_roles r ON r.oid = a.grantee
WHERE r.rolname = $1
  AND a.grantee <> n.nspowner
  AND n.nspname !~ '^pg_'
  AND n.nspname <> 'information_schema'
ORDER BY 1, 2";

/// `$1` schema, `$2` comma-separated relkinds -> (name, relkind)
pub const OBJECTS: &str = "\
SELECT c.relname::text, c.relkind::text
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
  AND c.relkind::text = ANY(string_to_array($2, ','))
ORDER BY 1";

/// `$1` schema, `$2` relation -> (grantee, privilege, is_grantable)
pub const OBJECT_ACLS: &str = "\
SELECT CASE WHEN a.grantee = 0 THEN 'PUBLIC' ELSE g.rolname::text END,
       a.privilege_type::text,
       a.is_grantable::text
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL aclexplode(COALESCE(
    c.relacl,
    acldefault(CASE WHEN c.relkind = 'S' THEN 's' ELSE 'r' END, c.relowner)
)) a
LEFT JOIN pg_roles g ON g.oid = a.grantee
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.grantee <> c.relowner
ORDER BY 1, 2";

/// `$1` defaclobjtype code, `$2` owner or `''`, `$3` schema or `''`
/// -> (owner, schema, grantee, privilege)
///
/// Only `IN SCHEMA` entries are returned; global default ACLs have no
/// namespace and drop out of the join. `is_grantable` is not read: default
/// privileges are reconciled as plain privileges, so a default entry held
/// WITH GRANT OPTION compares equal to the plain one and its grant option
/// is left as found.
pub const DEFAULT_PRIVILEGES: &str = "\
SELECT o.rolname::text,
       n.nspname::text,
       CASE WHEN a.grantee = 0 THEN 'PUBLIC' ELSE g.rolname::text END,
       a.privilege_type::text
FROM pg_default_acl d
JOIN pg_roles o ON o.oid = d.defaclrole
JOIN pg_namespace n ON n.oid = d.defaclnamespace
CROSS JOIN LATERAL aclexplode(d.defaclacl) a
LEFT JOIN pg_roles g ON g.oid = a.grantee
WHERE d.defaclobjtype::text = $1
  AND a.grantee <> d.defaclrole
  AND ($2 = '' OR o.rolname = $2)
  AND ($3 = '' OR n.nspname = $3)
ORDER BY 1, 2, 3, 4";

/// `$1` schema, `$2` relation -> (schema, relation) of dependent views
pub const DEPENDENCIES: &str = "\
SELECT DISTINCT dn.nspname::text, dc.relname::text
FROM pg_depend d
JOIN pg_rewrite w ON w.oid = d.objid
JOIN pg_class dc ON dc.oid = w.ev_class
JOIN pg_namespace dn ON dn.oid = dc.relnamespace
JOIN pg_class c ON c.oid = d.refobjid
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE d.classid = 'pg_rewrite'::regclass
  AND d.refclassid = 'pg_class'::regclass
  AND n.nspname = $1
  AND c.relname = $2
  AND dc.oid <> c.oid
ORDER BY 1, 2";
