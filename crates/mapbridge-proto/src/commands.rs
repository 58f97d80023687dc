//! Names of the commands registered on the peer.
//!
//! The names are part of the external wire contract; parameters are opaque
//! to the transport core and interpreted by the peer's handlers. Nothing in
//! this crate restricts the registry to these names — they exist so both
//! sides share one vocabulary.

/// Liveness check; the reference peer answers with a bare `{"pong": true}`.
pub const PING: &str = "ping";
/// Queries application environment details (version, profile paths).
pub const GET_APP_INFO: &str = "get_app_info";
/// Opens a project file from disk, replacing the current project.
pub const LOAD_PROJECT: &str = "load_project";
/// Creates a new empty project and saves it to the given path.
pub const CREATE_NEW_PROJECT: &str = "create_new_project";
/// Returns metadata about the open project (title, path, CRS, layers).
pub const GET_PROJECT_INFO: &str = "get_project_info";
/// Saves the current project, optionally to a new path.
pub const SAVE_PROJECT: &str = "save_project";
/// Adds a vector layer to the current project.
pub const ADD_VECTOR_LAYER: &str = "add_vector_layer";
/// Adds a raster layer to the current project.
pub const ADD_RASTER_LAYER: &str = "add_raster_layer";
/// Lists the layers loaded in the current project.
pub const GET_LAYERS: &str = "get_layers";
/// Removes a layer from the project by identifier.
pub const REMOVE_LAYER: &str = "remove_layer";
/// Zooms the map canvas to a layer's extent.
pub const ZOOM_TO_LAYER: &str = "zoom_to_layer";
/// Reads attributes and geometry for features of a vector layer.
pub const GET_LAYER_FEATURES: &str = "get_layer_features";
/// Executes a processing algorithm with the supplied parameters.
pub const EXECUTE_PROCESSING: &str = "execute_processing";
/// Renders the current map view to an image file.
pub const RENDER_MAP: &str = "render_map";
/// Executes arbitrary code inside the application process.
pub const EXECUTE_CODE: &str = "execute_code";
/// Runs a test suite inside the application environment.
pub const RUN_TEST: &str = "run_test";
/// Installs a plugin from a local directory.
pub const INSTALL_PLUGIN: &str = "install_plugin";
/// Reloads or activates a plugin by name.
pub const RELOAD_PLUGIN: &str = "reload_plugin";
/// Installs a single processing script file.
pub const INSTALL_PROCESSING_SCRIPT: &str = "install_processing_script";
/// Lists the user-installed processing scripts.
pub const LIST_PROCESSING_SCRIPTS: &str = "list_processing_scripts";
