//! Schema documents of the security token contract family.

use std::sync::{Arc, LazyLock};

use crate::{error::BindingError, schema::Schema};

pub const SECURITY_TOKEN_JSON: &str = include_str!("../abi/SecurityToken.json");
pub const COMPLIANCE_SERVICE_JSON: &str = include_str!("../abi/ComplianceService.json");

static SECURITY_TOKEN: LazyLock<Result<Arc<Schema>, BindingError>> =
    LazyLock::new(|| Schema::parse(SECURITY_TOKEN_JSON).map(Arc::new));

static COMPLIANCE_SERVICE: LazyLock<Result<Arc<Schema>, BindingError>> =
    LazyLock::new(|| Schema::parse(COMPLIANCE_SERVICE_JSON).map(Arc::new));

/// Fungible token with issuance, redemption, compliance service pointer
/// and document registry.
pub fn security_token() -> Result<Arc<Schema>, BindingError> {
    SECURITY_TOKEN.clone()
}

/// Transfer and issuance rules consulted by the security token.
pub fn compliance_service() -> Result<Arc<Schema>, BindingError> {
    COMPLIANCE_SERVICE.clone()
}

/// Solidity interfaces of the contract family, used to cross-check
/// encodings produced from the schema documents.
#[allow(clippy::too_many_arguments)]
pub mod sol {
    alloy::sol! {
        #[derive(Debug)]
        interface ISecurityToken {
            event Transfer(address indexed from, address indexed to, uint256 value);
            event Approval(address indexed owner, address indexed spender, uint256 value);
            event Issued(address indexed _operator, address indexed _to, uint256 _value, bytes _data);
            event Redeemed(address indexed _operator, address indexed _from, uint256 _value, bytes _data);
            event DocumentUpdated(bytes32 indexed _name, string _uri, bytes32 _documentHash);
            event DocumentRemoved(bytes32 indexed _name, string _uri, bytes32 _documentHash);
            event ComplianceServiceUpdated(address indexed previousService, address indexed newService, uint256 version);

            error NotIssuable();
            error TransferRestricted(address from, address to, uint256 value, bytes1 code);
            error DocumentNotFound(bytes32 name);

            function name() external view returns (string);
            function symbol() external view returns (string);
            function decimals() external view returns (uint8);
            function totalSupply() external view returns (uint256);
            function balanceOf(address _owner) external view returns (uint256);
            function allowance(address _owner, address _spender) external view returns (uint256);
            function transfer(address _to, uint256 _value) external returns (bool);
            function approve(address _spender, uint256 _value) external returns (bool);
            function transferFrom(address _from, address _to, uint256 _value) external returns (bool);
            function isIssuable() external view returns (bool);
            function issue(address _tokenHolder, uint256 _value, bytes _data) external;
            function redeem(uint256 _value, bytes _data) external;
            function redeemFrom(address _tokenHolder, uint256 _value, bytes _data) external;
            function canTransfer(address _to, uint256 _value, bytes _data) external view returns (bool, bytes1, bytes32);
            function complianceService() external view returns (address);
            function complianceServiceVersion() external view returns (uint256);
            function setComplianceService(address _service) external;
            function getDocument(bytes32 _name) external view returns (string, bytes32, uint256);
            function setDocument(bytes32 _name, string _uri, bytes32 _documentHash) external;
            function removeDocument(bytes32 _name) external;
            function getAllDocuments() external view returns (bytes32[]);
        }
    }
}
